use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::StoreError;
use crate::op::{Op, OpResult, ReadResult, WriteResult};
use crate::scheduler::Message;

/// Per-file public façade. Forwards reads and writes to the scheduler,
/// tagged with the short path that identifies the owning worker. Stateless
/// beyond that reference; cheap to clone.
///
/// Exactly one `PathHandle` is memoised per short path for the lifetime of
/// the [`crate::Store`] that created it; repeated calls to
/// [`crate::Store::storage_for`] return the same instance.
#[derive(Clone)]
pub struct PathHandle {
    short_path: Arc<str>,
    sender: mpsc::UnboundedSender<Message>,
}

impl PathHandle {
    pub(crate) fn new(short_path: Arc<str>, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self { short_path, sender }
    }

    /// The short path this handle was created for.
    pub fn short_path(&self) -> &str {
        &self.short_path
    }

    /// Reads exactly `size` bytes starting at `offset`. `size` must be
    /// greater than zero. On success, the returned buffer's length is always
    /// exactly `size`.
    pub async fn read(&self, offset: u64, size: u32) -> ReadResult {
        if size == 0 {
            return Err(StoreError::InvalidReadSize);
        }
        let (respond, recv) = oneshot::channel();
        self.submit(Op::Read { offset, size }, respond)?;
        match recv.await {
            Ok(OpResult::Read(result)) => result,
            Ok(OpResult::Write(_)) => unreachable!("read submission yielded a write result"),
            Err(_) => Err(StoreError::SchedulerShutDown),
        }
    }

    /// Writes `data` starting at `offset`. Succeeds only if every byte was
    /// written; a short write with no OS error is surfaced as an error.
    pub async fn write(&self, offset: u64, data: impl Into<Bytes>) -> WriteResult {
        let (respond, recv) = oneshot::channel();
        self.submit(
            Op::Write {
                offset,
                data: data.into(),
            },
            respond,
        )?;
        match recv.await {
            Ok(OpResult::Write(result)) => result,
            Ok(OpResult::Read(_)) => unreachable!("write submission yielded a read result"),
            Err(_) => Err(StoreError::SchedulerShutDown),
        }
    }

    fn submit(&self, op: Op, respond: oneshot::Sender<OpResult>) -> Result<(), StoreError> {
        self.sender
            .send(Message::Submit {
                short_path: self.short_path.clone(),
                op,
                respond,
            })
            .map_err(|_| StoreError::SchedulerShutDown)
    }
}

impl std::fmt::Debug for PathHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathHandle")
            .field("short_path", &self.short_path)
            .finish()
    }
}
