//! An embedded, in-process key-value store. Keys have a two-level
//! structure, `"<collection><sep><member>"`; reads and writes target one
//! member, bulk operations target a whole collection. Mutations are held
//! in memory and drained to a directory tree on disk by a background
//! journal worker.
//!
//! ```no_run
//! use latchkv::Store;
//!
//! let store = Store::open("./db")?;
//! store.put("artist/daftpunk", b"discovery".to_vec())?;
//! assert_eq!(store.get("artist/daftpunk")?, b"discovery");
//! store.close()?;
//! # Ok::<(), latchkv::Error>(())
//! ```

mod codec;
mod collections;
mod error;
mod journal;
mod log;
mod member_map;
mod page;
mod registry;
mod store;
mod utils;

pub use error::Error;
pub use log::init_log;
pub use store::{OpenOptions, Store};

pub type Result<T> = std::result::Result<T, Error>;
