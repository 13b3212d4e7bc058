//! Process-wide bookkeeping of which canonical store paths are currently
//! open, so that two `Store::open` calls against the same directory from
//! the same process fail fast instead of silently corrupting each other.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::Error;

static OPEN_PATHS: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Registers `path` as open, failing with [`Error::PathInUse`] if some
/// other `Store` in this process already holds it.
pub(crate) fn try_register(path: &Path) -> Result<(), Error> {
    let mut open = OPEN_PATHS.lock().unwrap();
    if !open.insert(path.to_path_buf()) {
        return Err(Error::PathInUse {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Releases `path`, allowing a future `Store::open` to reuse it. A no-op if
/// `path` was never registered (defensive against double-close).
pub(crate) fn unregister(path: &Path) {
    OPEN_PATHS.lock().unwrap().remove(path);
}
