use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::journal::JournalProducer;
use crate::page::Page;
use crate::utils::HandyRwLock;

/// The set of members (key/value pages) belonging to one collection. Holds
/// its own lock, one level below the collections map: a write against one
/// collection's members never blocks a lookup in a different collection.
pub(crate) struct MemberMap {
    base_path: PathBuf,
    collection: String,
    members: RwLock<HashMap<String, Arc<Page>>>,
}

impl MemberMap {
    pub(crate) fn new(base_path: PathBuf, collection: String) -> MemberMap {
        MemberMap {
            base_path,
            collection,
            members: RwLock::new(HashMap::new()),
        }
    }

    /// Rehydrates a member map during store recovery from a directory
    /// listing already decoded into `(member, value)` pairs.
    pub(crate) fn from_loaded(
        base_path: PathBuf,
        collection: String,
        loaded: Vec<(String, Vec<u8>)>,
    ) -> MemberMap {
        let mut members = HashMap::with_capacity(loaded.len());
        for (member, value) in loaded {
            let page = Page::from_loaded(base_path.clone(), collection.clone(), member.clone(), value);
            members.insert(member, page);
        }
        MemberMap {
            base_path,
            collection,
            members: RwLock::new(members),
        }
    }

    /// `None` if there is no page for `member`, or if there is one but it
    /// has been concurrently marked deleted (the narrow race window between
    /// another thread's `delete` flipping the flag and this map entry being
    /// evicted). Both cases are `NoSuchKey` as far as callers are concerned.
    pub(crate) fn get(&self, member: &str) -> Option<Vec<u8>> {
        let page = self.members.rl().get(member).map(Arc::clone)?;
        page.get()
    }

    /// Snapshots the current set of pages, then fetches each value outside
    /// the map lock. Pages deleted between the snapshot and the fetch are
    /// silently omitted, so the result is a valid (if slightly stale) view
    /// rather than a strictly linearizable one.
    pub(crate) fn get_all(&self) -> Vec<(String, Vec<u8>)> {
        let snapshot: Vec<(String, Arc<Page>)> = {
            let members = self.members.rl();
            members.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
        };
        snapshot
            .into_iter()
            .filter_map(|(key, page)| page.get().map(|value| (key, value)))
            .collect()
    }

    /// Double-checked insertion: the common case (member already has a
    /// page) only ever takes the read lock.
    pub(crate) fn put(&self, member: &str, value: Vec<u8>, journal: &JournalProducer) {
        let existing = { self.members.rl().get(member).map(Arc::clone) };
        if let Some(page) = existing {
            page.set(value, journal);
            return;
        }
        let page = {
            let mut members = self.members.wl();
            match members.get(member) {
                Some(page) => Arc::clone(page),
                None => {
                    let page = Page::new(
                        self.base_path.clone(),
                        self.collection.clone(),
                        member.to_string(),
                    );
                    members.insert(member.to_string(), Arc::clone(&page));
                    page
                }
            }
        };
        page.set(value, journal);
    }

    /// A no-op if `member` has no page; deleting something that was never
    /// there, or already gone, is not an error. Removes the key from the
    /// mapping under the exclusive lock before tombstoning the page, so a
    /// deleted member is gone from the index immediately rather than
    /// lingering as a permanent tombstone entry.
    pub(crate) fn delete(&self, member: &str, journal: &JournalProducer) {
        if self.members.rl().get(member).is_none() {
            return;
        }
        let removed = { self.members.wl().remove(member) };
        if let Some(page) = removed {
            page.delete(journal);
        }
    }

    /// Tombstones every page in the map. Holds the exclusive lock for the
    /// whole pass so that no `put` can insert a fresh page while this is
    /// running; does not clear the map itself, each page's own tombstone
    /// record is what removes its file from disk, which lets a concurrent
    /// `get_all` snapshot see a consistent per-key pre/post state instead of
    /// a single atomic wipe.
    pub(crate) fn delete_all(&self, journal: &JournalProducer) {
        let members = self.members.wl();
        for page in members.values() {
            Arc::clone(page).delete(journal);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.rl().is_empty()
    }
}
