use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error as ThisError;

/// Errors surfaced to callers of a [`crate::PathHandle`], or raised synchronously
/// at the API boundary.
#[derive(Debug, Clone, ThisError)]
pub enum StoreError {
    /// Fewer bytes were read than requested, including the zero-byte (EOF) case.
    #[error(
        "short read on '{short_path}' at offset {offset}: requested {requested}, got {actual}"
    )]
    ShortRead {
        short_path: String,
        offset: u64,
        requested: u32,
        actual: u32,
    },

    /// The OS reported that fewer bytes were written than requested, with no error.
    #[error(
        "short write on '{short_path}' at offset {offset}: requested {requested}, wrote {actual}"
    )]
    ShortWrite {
        short_path: String,
        offset: u64,
        requested: u32,
        actual: u32,
    },

    /// A read or write syscall failed.
    #[error("I/O error on '{short_path}': {source}")]
    Io {
        short_path: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Opening, creating the enclosing directory for, or closing a path's file failed.
    /// The worker for this path is poisoned and will fail all further operations.
    #[error("worker for '{short_path}' is poisoned: {reason}")]
    WorkerPoisoned { short_path: String, reason: String },

    /// `read` was called with `size == 0`.
    #[error("read size must be greater than zero")]
    InvalidReadSize,

    /// `Store::new` was asked for a path that is not usable as a directory root.
    #[error("dir_path '{0}' is invalid: {1}")]
    InvalidDirPath(PathBuf, String),

    /// `maxOpenFiles` was zero.
    #[error("max_open_files must be at least 1")]
    InvalidMaxOpenFiles,

    /// The scheduler task has exited; no further operations can be scheduled.
    #[error("the store's scheduler task is no longer running")]
    SchedulerShutDown,
}

impl StoreError {
    pub(crate) fn io(short_path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            short_path: short_path.into(),
            source: Arc::new(source),
        }
    }
}
