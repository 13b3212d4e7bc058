use std::path::PathBuf;

use thiserror::Error;

/// Every way a [`crate::Store`] operation can fail.
///
/// Validation errors (`KeyInvalid`, `KeyIsCollection`, ...) are returned
/// synchronously from the operation that detected them. `Worker` is the
/// one variant that can only come back from [`crate::Store::close`]: it
/// means the journal's background thread panicked while draining.
#[derive(Debug, Error)]
pub enum Error {
    #[error("path is not a valid store directory: {}", path.display())]
    PathInvalid { path: PathBuf },

    #[error("path is already in use by another store: {}", path.display())]
    PathInUse { path: PathBuf },

    #[error("key is empty or starts with the collection separator: {key:?}")]
    KeyInvalid { key: String },

    #[error("key names a collection, not a member: {key:?}")]
    KeyIsCollection { key: String },

    #[error("key names a member, not a collection: {key:?}")]
    KeyIsMember { key: String },

    #[error("no such collection: {collection:?}")]
    NoSuchCollection { collection: String },

    #[error("no such key {member:?} in collection {collection:?}")]
    NoSuchKey { collection: String, member: String },

    #[error("checksum mismatch reading page file: {}", path.display())]
    FileChecksum { path: PathBuf },

    #[error("page file {} has unsupported major version {major}", path.display())]
    FileWrongVersion { path: PathBuf, major: u16 },

    #[error(
        "page file {} payload length mismatch: header says {expected}, found {actual}",
        path.display()
    )]
    FilePayloadLength {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("page file {} has a truncated or malformed header", path.display())]
    FileHeaderDecode { path: PathBuf },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal worker panicked: {panic_message}")]
    Worker { panic_message: String },
}
