use std::collections::VecDeque;
use std::fs::File;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::StoreError;
use crate::op::{Op, OpResult};

/// The scheduler's current wish for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Start,
    Stop,
}

/// Observed lifecycle of a path worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    Closed,
    Opening,
    Opened,
    Draining,
    Closing,
}

pub(crate) struct PendingOp {
    pub op: Op,
    pub respond: oneshot::Sender<OpResult>,
}

/// Per-file state machine. Lives inside the scheduler actor; never touched
/// from outside the scheduler's single execution context.
pub(crate) struct Worker {
    pub control: Control,
    pub state: WorkerState,
    pub fd: Option<Arc<File>>,
    pub ops: VecDeque<PendingOp>,
    pub in_flight_reads: u32,
    pub in_flight_writes: u32,
    pub start_cb_pending: bool,
    pub stop_cb_pending: bool,
    pub dir_ready: bool,
    /// Whether this worker currently holds a slot against the FD budget.
    /// Set the instant the scheduler commits to opening it; cleared the
    /// instant its close completes (or it is poisoned while holding one).
    pub counted: bool,
    pub in_stoppable_queue: bool,
    /// Once set, the worker serves no further ops; every queued and future
    /// op fails immediately with `WorkerPoisoned`.
    pub poisoned: Option<Arc<str>>,
}

impl Worker {
    pub fn new() -> Self {
        Self {
            control: Control::Stop,
            state: WorkerState::Closed,
            fd: None,
            ops: VecDeque::new(),
            in_flight_reads: 0,
            in_flight_writes: 0,
            start_cb_pending: false,
            stop_cb_pending: false,
            dir_ready: false,
            counted: false,
            in_stoppable_queue: false,
            poisoned: None,
        }
    }

    pub fn fail_all_queued(&mut self, short_path: &str, reason: &str) {
        while let Some(pending) = self.ops.pop_front() {
            let err = StoreError::WorkerPoisoned {
                short_path: short_path.to_string(),
                reason: reason.to_string(),
            };
            let result = match pending.op {
                Op::Read { .. } => OpResult::Read(Err(err)),
                Op::Write { .. } => OpResult::Write(Err(err)),
            };
            let _ = pending.respond.send(result);
        }
    }
}
