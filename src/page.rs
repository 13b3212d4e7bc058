use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::journal::JournalProducer;
use crate::utils::HandyRwLock;

struct PageState {
    value: Vec<u8>,
    dirty: bool,
    deleted: bool,
}

/// The in-memory representation of one member's value, plus the flags the
/// journal needs to persist it. One page per (collection, member); this is
/// the finest-grained lock in the store (a write to one member never
/// blocks a read of another).
pub(crate) struct Page {
    pub(crate) base_path: PathBuf,
    pub(crate) collection: String,
    pub(crate) member: String,
    state: RwLock<PageState>,
}

impl Page {
    pub(crate) fn new(base_path: PathBuf, collection: String, member: String) -> Arc<Page> {
        Arc::new(Page {
            base_path,
            collection,
            member,
            state: RwLock::new(PageState {
                value: Vec::new(),
                dirty: false,
                deleted: false,
            }),
        })
    }

    /// Rehydrates a page loaded from disk during recovery. The loaded value
    /// is already on disk, so the page starts out clean.
    pub(crate) fn from_loaded(
        base_path: PathBuf,
        collection: String,
        member: String,
        value: Vec<u8>,
    ) -> Arc<Page> {
        Arc::new(Page {
            base_path,
            collection,
            member,
            state: RwLock::new(PageState {
                value,
                dirty: false,
                deleted: false,
            }),
        })
    }

    /// Returns a fresh copy of the current value, or `None` if the page has
    /// been marked deleted (tombstoned, but not yet evicted from its
    /// member map).
    pub(crate) fn get(&self) -> Option<Vec<u8>> {
        let state = self.state.rl();
        if state.deleted {
            None
        } else {
            Some(state.value.clone())
        }
    }

    /// Replaces the value, copying `value` in. Enqueues exactly one
    /// `WritePage` journal record per clean-to-dirty transition.
    ///
    /// Takes `self` by owned `Arc`, not `&self`: the only way to hand a
    /// page to the journal is to give up a reference count to it, and
    /// requiring the caller to clone makes that cost visible at the call
    /// site instead of happening implicitly inside `set`.
    pub(crate) fn set(self: Arc<Self>, value: Vec<u8>, journal: &JournalProducer) {
        let was_dirty = {
            let mut state = self.state.wl();
            let was_dirty = state.dirty;
            state.value = value;
            state.deleted = false;
            state.dirty = true;
            was_dirty
        };
        if !was_dirty {
            journal.enqueue_write_page(self);
        }
    }

    /// Empties the value and marks the page deleted. Same single-enqueue
    /// protocol as `set`.
    pub(crate) fn delete(self: Arc<Self>, journal: &JournalProducer) {
        let was_dirty = {
            let mut state = self.state.wl();
            let was_dirty = state.dirty;
            state.value.clear();
            state.deleted = true;
            state.dirty = true;
            was_dirty
        };
        if !was_dirty {
            journal.enqueue_write_page(self);
        }
    }

    /// Called only by the journal worker. Snapshots what needs to be
    /// written to disk and clears `dirty` under the same lock readers use,
    /// so a mutation racing the drain is never lost: it either lands before
    /// the clear (and is captured in this snapshot) or after (and
    /// re-enqueues on its own clean-to-dirty transition).
    pub(crate) fn snapshot_for_drain(&self) -> (bool, Vec<u8>) {
        let mut state = self.state.wl();
        state.dirty = false;
        (state.deleted, state.value.clone())
    }
}
