//! The dirty-page journal: a background thread that drains queued directory
//! and page writes so that [`crate::Page::set`]/[`crate::Page::delete`]
//! never block on disk I/O.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Select, Sender};
use log::{error, warn};

use crate::codec;
use crate::error::Error;
use crate::page::Page;

/// A cloneable handle producers use to enqueue work. Holds no reference to
/// the worker thread itself, only the sending ends of its queues.
#[derive(Clone)]
pub(crate) struct JournalProducer {
    create_dir_tx: Sender<String>,
    remove_dir_tx: Sender<String>,
    write_page_tx: Sender<Arc<Page>>,
}

impl JournalProducer {
    pub(crate) fn enqueue_create_dir(&self, collection: String) {
        // The worker outlives every producer handle until shutdown, so a
        // disconnected send here would mean we are racing our own
        // shutdown; dropping the record is the right call in that case.
        let _ = self.create_dir_tx.send(collection);
    }

    pub(crate) fn enqueue_remove_dir(&self, collection: String) {
        let _ = self.remove_dir_tx.send(collection);
    }

    pub(crate) fn enqueue_write_page(&self, page: Arc<Page>) {
        let _ = self.write_page_tx.send(page);
    }
}

/// Owns the worker thread and the sending ends producers clone from. There
/// is exactly one `Journal` per open store.
pub(crate) struct Journal {
    create_dir_tx: Sender<String>,
    remove_dir_tx: Sender<String>,
    write_page_tx: Sender<Arc<Page>>,
    shutdown_tx: Sender<()>,
    drained_rx: Receiver<()>,
    worker: Option<JoinHandle<()>>,
}

impl Journal {
    /// Spawns the background worker rooted at `base_path`, used to turn the
    /// collection names carried by `CreateDir`/`RemoveDir` records into full
    /// paths. `WritePage` records carry their own path via `Page::base_path`.
    /// `dir_mode`/`file_mode` are the unix permission bits applied to newly
    /// created collection directories and page files; ignored elsewhere.
    pub(crate) fn spawn(base_path: &Path, dir_mode: u32, file_mode: u32) -> Journal {
        let (create_dir_tx, create_dir_rx) = channel::unbounded::<String>();
        let (remove_dir_tx, remove_dir_rx) = channel::unbounded::<String>();
        let (write_page_tx, write_page_rx) = channel::unbounded::<Arc<Page>>();
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let (drained_tx, drained_rx) = channel::bounded::<()>(1);

        let base_path = base_path.to_path_buf();
        let worker = std::thread::Builder::new()
            .name("latchkv-journal".to_string())
            .spawn(move || {
                worker_loop(
                    base_path,
                    dir_mode,
                    file_mode,
                    create_dir_rx,
                    remove_dir_rx,
                    write_page_rx,
                    shutdown_rx,
                    drained_tx,
                )
            })
            .expect("failed to spawn journal worker thread");

        Journal {
            create_dir_tx,
            remove_dir_tx,
            write_page_tx,
            shutdown_tx,
            drained_rx,
            worker: Some(worker),
        }
    }

    #[cfg(test)]
    pub(crate) fn spawn_for_test(base_path: &Path) -> Journal {
        Journal::spawn(base_path, 0o740, 0o640)
    }

    pub(crate) fn producer(&self) -> JournalProducer {
        JournalProducer {
            create_dir_tx: self.create_dir_tx.clone(),
            remove_dir_tx: self.remove_dir_tx.clone(),
            write_page_tx: self.write_page_tx.clone(),
        }
    }

    /// Signals the worker to stop once every queue has drained, then waits
    /// for it to confirm and joins the thread. Idempotent: calling this
    /// twice is a no-op on the second call.
    pub(crate) fn shutdown(&mut self) -> Result<(), Error> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let _ = self.shutdown_tx.send(());
        let _ = self.drained_rx.recv();
        worker.join().map_err(|panic| Error::Worker {
            panic_message: describe_panic(panic),
        })
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(err) = self.shutdown() {
                error!("journal worker panicked during drop: {err}");
            }
        }
    }
}

fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn worker_loop(
    base_path: PathBuf,
    dir_mode: u32,
    file_mode: u32,
    create_dir_rx: Receiver<String>,
    remove_dir_rx: Receiver<String>,
    write_page_rx: Receiver<Arc<Page>>,
    shutdown_rx: Receiver<()>,
    drained_tx: Sender<()>,
) {
    let mut shutting_down = false;
    loop {
        let mut did_work = false;

        while let Ok(collection) = create_dir_rx.try_recv() {
            apply_create_dir(&base_path, &collection, dir_mode);
            did_work = true;
        }
        while let Ok(collection) = remove_dir_rx.try_recv() {
            apply_remove_dir(&base_path, &collection);
            did_work = true;
        }
        while let Ok(page) = write_page_rx.try_recv() {
            apply_write_page(&page, dir_mode, file_mode);
            did_work = true;
        }

        if did_work {
            continue;
        }

        if shutting_down {
            let _ = drained_tx.send(());
            return;
        }

        let mut sel = Select::new();
        let idx_create = sel.recv(&create_dir_rx);
        let idx_remove = sel.recv(&remove_dir_rx);
        let idx_write = sel.recv(&write_page_rx);
        let idx_shutdown = sel.recv(&shutdown_rx);
        let oper = sel.select();
        match oper.index() {
            i if i == idx_shutdown => {
                let _ = oper.recv(&shutdown_rx);
                shutting_down = true;
            }
            i if i == idx_create => {
                if let Ok(collection) = oper.recv(&create_dir_rx) {
                    apply_create_dir(&base_path, &collection, dir_mode);
                }
            }
            i if i == idx_remove => {
                if let Ok(collection) = oper.recv(&remove_dir_rx) {
                    apply_remove_dir(&base_path, &collection);
                }
            }
            i if i == idx_write => {
                if let Ok(page) = oper.recv(&write_page_rx) {
                    apply_write_page(&page, dir_mode, file_mode);
                }
            }
            _ => unreachable!("Select only registered the four channels above"),
        }
    }
}

fn apply_create_dir(base_path: &Path, collection: &str, dir_mode: u32) {
    let path = codec::collection_path(base_path, collection);
    if let Err(err) = std::fs::create_dir_all(&path) {
        warn!("journal: failed to create collection directory {collection:?}: {err}");
        return;
    }
    set_mode(&path, dir_mode);
}

fn apply_remove_dir(base_path: &Path, collection: &str) {
    let path = codec::collection_path(base_path, collection);
    if let Err(err) = std::fs::remove_dir_all(&path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!("journal: failed to remove collection directory {collection:?}: {err}");
        }
    }
}

fn apply_write_page(page: &Page, dir_mode: u32, file_mode: u32) {
    let (deleted, value) = page.snapshot_for_drain();
    let path = codec::member_path(&page.base_path, &page.collection, &page.member);
    if deleted {
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("journal: failed to remove page file {path:?}: {err}");
            }
        }
        return;
    }
    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            warn!("journal: failed to create parent directory for {path:?}: {err}");
            return;
        }
        set_mode(parent, dir_mode);
    }
    let encoded = codec::encode_page(&page.member, &value);
    if let Err(err) = std::fs::write(&path, encoded) {
        warn!("journal: failed to write page file {path:?}: {err}");
        return;
    }
    set_mode(&path, file_mode);
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
        warn!("journal: failed to set permissions on {path:?}: {err}");
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}
