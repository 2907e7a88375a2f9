use bytes::Bytes;

use crate::error::StoreError;

/// A single positional operation dispatched to a path worker.
#[derive(Debug)]
pub(crate) enum Op {
    Read { offset: u64, size: u32 },
    Write { offset: u64, data: Bytes },
}

/// Result of a [`Op::Read`].
pub type ReadResult = Result<Bytes, StoreError>;

/// Result of a [`Op::Write`].
pub type WriteResult = Result<(), StoreError>;

pub(crate) enum OpResult {
    Read(ReadResult),
    Write(WriteResult),
}
