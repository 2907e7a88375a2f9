//! A bounded-FD random-access file store.
//!
//! Presents many logical files, each addressable by a short path name, and
//! lets callers issue arbitrary positional reads and writes against them,
//! while the process never holds more than a configured number of
//! operating-system file descriptors open at once.
//!
//! The design is built around two cooperating pieces: a per-file state
//! machine (a "path worker") that cycles between closed and open, drains
//! outstanding I/O before closing, and queues operations that arrive while
//! its file is not open; and a process-wide scheduler that keeps
//! `open_fds <= max_open_files`, evicting idle workers FIFO to make room for
//! newly demanded ones. Everything that mutates scheduler or worker state
//! runs on a single dedicated task, so no lock is needed to protect it;
//! actual blocking I/O is dispatched off that task and its completion
//! re-enters it as a message.
//!
//! ```no_run
//! use fdstore::{Store, StoreConfig};
//!
//! # async fn run() -> Result<(), fdstore::StoreError> {
//! let store = Store::new(StoreConfig::new("/tmp/fdstore-example", 64))?;
//! let handle = store.storage_for("a/b/c.bin");
//! handle.write(0, &b"hello world!"[..]).await?;
//! let bytes = handle.read(0, 12).await?;
//! assert_eq!(&bytes[..], b"hello world!");
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handle;
mod io;
mod op;
mod scheduler;
mod store;
mod worker;

pub use config::StoreConfig;
pub use error::StoreError;
pub use handle::PathHandle;
pub use store::Store;
