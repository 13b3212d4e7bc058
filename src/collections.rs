use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::error::Error;
use crate::journal::JournalProducer;
use crate::member_map::MemberMap;
use crate::utils::HandyRwLock;

/// The top level of the two-level index: collection name to member map.
/// This is the coarsest lock in the store, held only long enough to look up
/// or insert a collection entry, never across a member operation.
pub(crate) struct Collections {
    base_path: PathBuf,
    collections: RwLock<HashMap<String, Arc<MemberMap>>>,
}

impl Collections {
    pub(crate) fn new(base_path: PathBuf) -> Collections {
        Collections {
            base_path,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Rehydrates the index from a recovery scan of the store directory.
    pub(crate) fn from_loaded(
        base_path: PathBuf,
        loaded: HashMap<String, MemberMap>,
    ) -> Collections {
        let collections = loaded
            .into_iter()
            .map(|(name, map)| (name, Arc::new(map)))
            .collect();
        Collections {
            base_path,
            collections: RwLock::new(collections),
        }
    }

    fn find(&self, collection: &str) -> Option<Arc<MemberMap>> {
        self.collections.rl().get(collection).map(Arc::clone)
    }

    /// Double-checked insertion: the common case (collection already
    /// exists) only ever takes the read lock. Enqueues exactly one
    /// `CreateDir` record, on the thread that actually wins the insert.
    fn find_or_create(&self, collection: &str, journal: &JournalProducer) -> Arc<MemberMap> {
        if let Some(map) = self.find(collection) {
            return map;
        }
        let (map, created) = {
            let mut collections = self.collections.wl();
            match collections.get(collection) {
                Some(map) => (Arc::clone(map), false),
                None => {
                    let map = Arc::new(MemberMap::new(self.base_path.clone(), collection.to_string()));
                    collections.insert(collection.to_string(), Arc::clone(&map));
                    (map, true)
                }
            }
        };
        if created {
            journal.enqueue_create_dir(collection.to_string());
        }
        map
    }

    pub(crate) fn get(&self, collection: &str, member: &str) -> Result<Vec<u8>, Error> {
        let map = self.find(collection).ok_or_else(|| Error::NoSuchCollection {
            collection: collection.to_string(),
        })?;
        map.get(member).ok_or_else(|| Error::NoSuchKey {
            collection: collection.to_string(),
            member: member.to_string(),
        })
    }

    pub(crate) fn get_all(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, Error> {
        let map = self.find(collection).ok_or_else(|| Error::NoSuchCollection {
            collection: collection.to_string(),
        })?;
        Ok(map.get_all())
    }

    pub(crate) fn put(
        &self,
        collection: &str,
        member: &str,
        value: Vec<u8>,
        journal: &JournalProducer,
    ) {
        let map = self.find_or_create(collection, journal);
        map.put(member, value, journal);
    }

    /// Deleting a key from a collection that does not exist is an error;
    /// deleting a key that never existed within an existing collection is
    /// not (see [`MemberMap::delete`]).
    pub(crate) fn delete_key(
        &self,
        collection: &str,
        member: &str,
        journal: &JournalProducer,
    ) -> Result<(), Error> {
        let map = self.find(collection).ok_or_else(|| Error::NoSuchCollection {
            collection: collection.to_string(),
        })?;
        map.delete(member, journal);
        Ok(())
    }

    /// Tombstones every member of `collection` without removing the
    /// collection itself (the backing directory stays; each page's own
    /// tombstone record is what clears its file). This is what the public
    /// `delete_all` operation uses.
    pub(crate) fn delete_all_members(
        &self,
        collection: &str,
        journal: &JournalProducer,
    ) -> Result<(), Error> {
        let map = self.find(collection).ok_or_else(|| Error::NoSuchCollection {
            collection: collection.to_string(),
        })?;
        map.delete_all(journal);
        Ok(())
    }

    /// Removes a whole collection, directory included. Not reachable from
    /// the public `Store` surface (mirrors §4.2's member-map granularity at
    /// the collection level for symmetry; kept for the collection-lifecycle
    /// capability it documents). Idempotent: deleting a collection that is
    /// already gone, or was never created, is a silent no-op.
    #[allow(dead_code)]
    pub(crate) fn delete_collection(&self, collection: &str, journal: &JournalProducer) {
        let removed = self.collections.wl().remove(collection);
        if let Some(map) = removed {
            map.delete_all(journal);
            journal.enqueue_remove_dir(collection.to_string());
        }
    }

    /// Used by [`crate::Store::get_all`]-style collection listing and by
    /// recovery reporting; not part of the public API.
    #[cfg(test)]
    pub(crate) fn collection_names(&self) -> Vec<String> {
        self.collections.rl().keys().cloned().collect()
    }
}
