//! The store facade: binds a directory to a [`Collections`] index and a
//! [`Journal`], enforces the "one store per path" invariant, and exposes
//! the five data operations over the `"<collection><sep><member>"` key
//! syntax described in [`crate::utils`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::warn;

use crate::codec;
use crate::collections::Collections;
use crate::error::Error;
use crate::journal::Journal;
use crate::member_map::MemberMap;
use crate::registry;
use crate::utils::{check_key_valid, collection_name, is_collection_key, split_key};

const DEFAULT_DIR_MODE: u32 = 0o740;
const DEFAULT_FILE_MODE: u32 = 0o640;

/// Builder for opening a [`Store`], mirroring `std::fs::OpenOptions`: a
/// plain constructor plus setters for callers who need non-default
/// permission bits.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    create: bool,
    dir_mode: u32,
    file_mode: u32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            create: true,
            dir_mode: DEFAULT_DIR_MODE,
            file_mode: DEFAULT_FILE_MODE,
        }
    }
}

impl OpenOptions {
    pub fn new() -> OpenOptions {
        OpenOptions::default()
    }

    /// Whether `open` may create the base directory if it does not exist.
    /// Defaults to `true`.
    pub fn create(mut self, create: bool) -> OpenOptions {
        self.create = create;
        self
    }

    /// Unix permission bits applied to the base directory and every
    /// collection directory created underneath it. Ignored on non-unix
    /// targets. Defaults to `0o740`.
    pub fn dir_mode(mut self, mode: u32) -> OpenOptions {
        self.dir_mode = mode;
        self
    }

    /// Unix permission bits applied to page files as they are written.
    /// Ignored on non-unix targets. Defaults to `0o640`.
    pub fn file_mode(mut self, mode: u32) -> OpenOptions {
        self.file_mode = mode;
        self
    }

    pub fn open(self, path: impl AsRef<Path>) -> Result<Store, Error> {
        Store::open_with(path.as_ref(), &self)
    }
}

/// A single open key-value store bound to one directory on disk.
///
/// `Store` owns the collections index and the journal worker for as long
/// as it is alive. Dropping or [`close`](Store::close)ing it blocks until
/// every queued mutation has been written out, then releases the
/// process-wide claim on its base path so another `Store` may reopen it.
pub struct Store {
    base_path: PathBuf,
    collections: Collections,
    journal: Journal,
}

impl Store {
    /// Equivalent to `OpenOptions::new().open(path)`.
    pub fn open(path: impl AsRef<Path>) -> Result<Store, Error> {
        OpenOptions::new().open(path)
    }

    fn open_with(path: &Path, opts: &OpenOptions) -> Result<Store, Error> {
        if !path.exists() {
            if !opts.create {
                return Err(Error::PathInvalid {
                    path: path.to_path_buf(),
                });
            }
            std::fs::create_dir_all(path)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(opts.dir_mode))?;
            }
        }
        if !path.is_dir() {
            return Err(Error::PathInvalid {
                path: path.to_path_buf(),
            });
        }
        let base_path = std::fs::canonicalize(path)?;

        registry::try_register(&base_path)?;

        let loaded = match load_existing_collections(&base_path) {
            Ok(loaded) => loaded,
            Err(err) => {
                registry::unregister(&base_path);
                return Err(err);
            }
        };

        let collections = Collections::from_loaded(base_path.clone(), loaded);
        let journal = Journal::spawn(&base_path, opts.dir_mode, opts.file_mode);

        Ok(Store {
            base_path,
            collections,
            journal,
        })
    }

    /// Signals the journal to drain, waits for it, then releases the
    /// process-wide claim on this store's path. Consumes `self`: there is
    /// no way to call a data operation on a closed store because there is
    /// no longer a `Store` value to call it on. The path is actually
    /// released by `Store`'s `Drop` impl, which runs as `self` goes out of
    /// scope at the end of this call, not here directly, so that there is
    /// only ever one unregistering site instead of two racing to do it.
    pub fn close(mut self) -> Result<(), Error> {
        self.journal.shutdown()
    }
}

/// A `Store` dropped without an explicit `close()` (an early return, a
/// panicking test, ...) must still release its claim on `base_path`,
/// otherwise that path could never be reopened in this process again. This
/// is also the only place that unregisters: `close()` delegates to it
/// rather than unregistering itself and then dropping, which would let a
/// `Store::open` racing between the two calls get its fresh registration
/// clobbered by the second one.
///
/// `shutdown` is called here explicitly, not left to `Journal`'s own `Drop`:
/// a struct's fields drop only *after* its own `Drop::drop` body returns, so
/// unregistering first and letting the field drop glue join the worker
/// afterward would free the path for a new `Store::open` while the old
/// journal was still draining its backlog to the same directory.
/// `Journal::shutdown` is idempotent, so calling it again here when `close`
/// already ran it is a harmless no-op.
impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.journal.shutdown();
        registry::unregister(&self.base_path);
    }
}

impl Store {
    pub fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        check_key_valid(key)?;
        if is_collection_key(key) {
            return Err(Error::KeyIsCollection {
                key: key.to_string(),
            });
        }
        let (collection, member) = split_key(key);
        self.collections.get(collection, member)
    }

    pub fn get_all(&self, key: &str) -> Result<Vec<Vec<u8>>, Error> {
        check_key_valid(key)?;
        if !is_collection_key(key) {
            return Err(Error::KeyIsMember {
                key: key.to_string(),
            });
        }
        let collection = collection_name(key);
        let pairs = self.collections.get_all(collection)?;
        Ok(pairs.into_iter().map(|(_, value)| value).collect())
    }

    pub fn put(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        check_key_valid(key)?;
        if is_collection_key(key) {
            return Err(Error::KeyIsCollection {
                key: key.to_string(),
            });
        }
        let (collection, member) = split_key(key);
        let producer = self.journal.producer();
        self.collections.put(collection, member, value, &producer);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), Error> {
        check_key_valid(key)?;
        if is_collection_key(key) {
            return Err(Error::KeyIsCollection {
                key: key.to_string(),
            });
        }
        let (collection, member) = split_key(key);
        let producer = self.journal.producer();
        self.collections.delete_key(collection, member, &producer)
    }

    pub fn delete_all(&self, key: &str) -> Result<(), Error> {
        check_key_valid(key)?;
        if !is_collection_key(key) {
            return Err(Error::KeyIsMember {
                key: key.to_string(),
            });
        }
        let collection = collection_name(key);
        let producer = self.journal.producer();
        self.collections.delete_all_members(collection, &producer)
    }
}

/// Walks `base_path`: each immediate subdirectory is a collection, each
/// regular file inside it a candidate page. Corrupted files are logged and
/// skipped rather than failing the whole open.
fn load_existing_collections(base_path: &Path) -> Result<HashMap<String, MemberMap>, Error> {
    let mut loaded = HashMap::new();
    for entry in std::fs::read_dir(base_path)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dirname = entry.file_name().to_string_lossy().into_owned();
        let collection = match codec::decode_collection_dirname(&dirname) {
            Some(collection) => collection,
            None => {
                warn!("store: skipping directory with an unrecognized name {dirname:?}");
                continue;
            }
        };
        let mut members = Vec::new();
        for file in std::fs::read_dir(entry.path())? {
            let file = file?;
            if !file.file_type()?.is_file() {
                continue;
            }
            let path = file.path();
            let data = std::fs::read(&path)?;
            match codec::decode_page(&path, &data) {
                Ok((key, value)) => members.push((key, value)),
                Err(err) => warn!("store: skipping unreadable page file {path:?}: {err}"),
            }
        }
        let map = MemberMap::from_loaded(base_path.to_path_buf(), collection.clone(), members);
        loaded.insert(collection, map);
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.put("artist/daftpunk", b"discovery".to_vec()).unwrap();
        assert_eq!(store.get("artist/daftpunk").unwrap(), b"discovery".to_vec());

        store.delete("artist/daftpunk").unwrap();
        assert!(matches!(
            store.get("artist/daftpunk").unwrap_err(),
            Error::NoSuchKey { .. }
        ));

        store.close().unwrap();
    }

    #[test]
    fn get_all_and_delete_all_on_a_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        for i in 0..10 {
            store
                .put(&format!("artist/daftpunk{i}"), format!("v{i}").into_bytes())
                .unwrap();
        }
        assert_eq!(store.get_all("artist").unwrap().len(), 10);

        store.delete_all("artist").unwrap();
        for i in 0..10 {
            assert!(matches!(
                store.get(&format!("artist/daftpunk{i}")).unwrap_err(),
                Error::NoSuchKey { .. }
            ));
        }

        store.close().unwrap();
    }

    #[test]
    fn collection_keys_are_rejected_by_member_operations() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        assert!(matches!(
            store.get("artist").unwrap_err(),
            Error::KeyIsCollection { .. }
        ));
        assert!(matches!(
            store.put("artist/", b"x".to_vec()).unwrap_err(),
            Error::KeyIsCollection { .. }
        ));
        assert!(matches!(
            store.delete("artist").unwrap_err(),
            Error::KeyIsCollection { .. }
        ));

        store.close().unwrap();
    }

    #[test]
    fn member_keys_are_rejected_by_bulk_operations() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        assert!(matches!(
            store.get_all("artist/daftpunk").unwrap_err(),
            Error::KeyIsMember { .. }
        ));
        assert!(matches!(
            store.delete_all("artist/daftpunk").unwrap_err(),
            Error::KeyIsMember { .. }
        ));

        store.close().unwrap();
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        assert!(matches!(store.get("").unwrap_err(), Error::KeyInvalid { .. }));
        assert!(matches!(
            store.put("/artist", b"x".to_vec()).unwrap_err(),
            Error::KeyInvalid { .. }
        ));

        store.close().unwrap();
    }

    #[test]
    fn persists_across_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = Store::open(dir.path()).unwrap();
        store.put("artist/daftpunk", b"discovery".to_vec()).unwrap();
        store.close().unwrap();

        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.get("artist/daftpunk").unwrap(), b"discovery".to_vec());
        store.close().unwrap();
    }

    #[test]
    fn opening_the_same_path_twice_in_one_process_fails() {
        let dir = tempfile::tempdir().unwrap();
        let first = Store::open(dir.path()).unwrap();
        let err = Store::open(dir.path()).unwrap_err();
        assert!(matches!(err, Error::PathInUse { .. }));
        first.close().unwrap();

        // Now that the path has been released, reopening it succeeds.
        let second = Store::open(dir.path()).unwrap();
        second.close().unwrap();
    }

    #[test]
    fn a_corrupted_page_file_is_skipped_on_reopen_but_others_load() {
        let dir = tempfile::tempdir().unwrap();

        let store = Store::open(dir.path()).unwrap();
        store.put("artist/daftpunk", b"discovery".to_vec()).unwrap();
        store.put("artist/justice", b"cross".to_vec()).unwrap();
        store.close().unwrap();

        let corrupted_path = codec::member_path(dir.path(), "artist", "daftpunk");
        let mut bytes = std::fs::read(&corrupted_path).unwrap();
        bytes[12] ^= 0xff;
        std::fs::write(&corrupted_path, bytes).unwrap();

        let store = Store::open(dir.path()).unwrap();
        assert!(matches!(
            store.get("artist/daftpunk").unwrap_err(),
            Error::NoSuchKey { .. }
        ));
        assert_eq!(store.get("artist/justice").unwrap(), b"cross".to_vec());
        store.close().unwrap();
    }
}
