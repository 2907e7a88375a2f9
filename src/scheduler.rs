use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::io;
use crate::op::{Op, OpResult};
use crate::worker::{Control, PendingOp, Worker, WorkerState};

pub(crate) enum Message {
    EnsureWorker {
        short_path: Arc<str>,
    },
    Submit {
        short_path: Arc<str>,
        op: Op,
        respond: oneshot::Sender<OpResult>,
    },
    OpenCompleted {
        short_path: Arc<str>,
        result: Result<std::fs::File, std::io::Error>,
    },
    CloseCompleted {
        short_path: Arc<str>,
        result: Result<(), std::io::Error>,
    },
    IoCompleted {
        short_path: Arc<str>,
        kind: IoKind,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum IoKind {
    Read,
    Write,
}

/// The process-wide scheduler: a single-threaded cooperative event loop that
/// owns every path worker and the global FD budget. Runs as one dedicated
/// tokio task; every mutation to worker state or the scheduling queues
/// happens inside this loop, never concurrently.
pub(crate) struct SchedulerActor {
    config: StoreConfig,
    workers: HashMap<Arc<str>, Worker>,
    stoppable_queue: VecDeque<Arc<str>>,
    schedule_queue: VecDeque<Arc<str>>,
    num_active: usize,
    self_tx: mpsc::UnboundedSender<Message>,
}

impl SchedulerActor {
    pub fn spawn(config: StoreConfig) -> mpsc::UnboundedSender<Message> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let self_tx = tx.clone();
        tokio::spawn(async move {
            let mut actor = SchedulerActor {
                config,
                workers: HashMap::new(),
                stoppable_queue: VecDeque::new(),
                schedule_queue: VecDeque::new(),
                num_active: 0,
                self_tx,
            };
            while let Some(message) = rx.recv().await {
                actor.handle_message(message);
            }
            debug!("scheduler actor exiting: all senders dropped");
        });
        tx
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::EnsureWorker { short_path } => self.ensure_worker(short_path),
            Message::Submit {
                short_path,
                op,
                respond,
            } => self.submit(short_path, op, respond),
            Message::OpenCompleted { short_path, result } => {
                self.on_open_completed(short_path, result)
            }
            Message::CloseCompleted { short_path, result } => {
                self.on_close_completed(short_path, result)
            }
            Message::IoCompleted { short_path, kind } => self.on_io_completed(short_path, kind),
        }
    }

    /// Creates the worker entry for `short_path` if it doesn't exist yet,
    /// without touching its control/state. Keeps `workers`'s key set in
    /// lockstep with the handle table from the moment `storage_for` is
    /// called, rather than waiting for the first submitted op.
    fn ensure_worker(&mut self, short_path: Arc<str>) {
        self.workers.entry(short_path).or_insert_with(Worker::new);
    }

    fn submit(&mut self, short_path: Arc<str>, op: Op, respond: oneshot::Sender<OpResult>) {
        // Reject a short path that escapes `dir_path` synchronously, before a
        // worker is created or any filesystem access is attempted.
        if let Err(err) = self.config.resolve(&short_path) {
            let result = match op {
                Op::Read { .. } => OpResult::Read(Err(err)),
                Op::Write { .. } => OpResult::Write(Err(err)),
            };
            let _ = respond.send(result);
            return;
        }

        let worker = self
            .workers
            .entry(short_path.clone())
            .or_insert_with(Worker::new);

        if let Some(reason) = worker.poisoned.clone() {
            let err = StoreError::WorkerPoisoned {
                short_path: short_path.to_string(),
                reason: reason.to_string(),
            };
            let result = match op {
                Op::Read { .. } => OpResult::Read(Err(err)),
                Op::Write { .. } => OpResult::Write(Err(err)),
            };
            let _ = respond.send(result);
            return;
        }

        worker.ops.push_back(PendingOp { op, respond });
        // An idle `Opened` worker sitting in the stoppable queue must
        // dispatch this op right away, not wait for some unrelated
        // completion to tick it.
        self.tick(&short_path);
        self.schedule_queue.push_back(short_path);
        self.pull();
    }

    /// The scheduling core: drains the schedule queue, opening or evicting
    /// workers as needed to respect the FD budget.
    fn pull(&mut self) {
        loop {
            let Some(short_path) = self.schedule_queue.pop_front() else {
                return;
            };

            let (control, state, poisoned) = match self.workers.get(&short_path) {
                Some(worker) => (worker.control, worker.state, worker.poisoned.is_some()),
                None => continue,
            };
            if poisoned {
                continue;
            }

            let fd_headroom = self.num_active < self.config.max_open_files;
            if !fd_headroom && self.stoppable_queue.is_empty() {
                // Put the worker back; nothing can make progress this turn.
                self.schedule_queue.push_front(short_path);
                return;
            }

            match control {
                Control::Start => {
                    // Already heading toward (or at) Opened; its own tick
                    // will pick up the ops that were just added.
                    continue;
                }
                Control::Stop => {
                    if state != WorkerState::Closed {
                        trace!(path = %short_path, "rescuing worker mid-stop");
                        self.request_start(&short_path);
                        continue;
                    }

                    if fd_headroom {
                        let worker = self.workers.get_mut(&short_path).unwrap();
                        worker.counted = true;
                        self.num_active += 1;
                        self.request_start(&short_path);
                        continue;
                    }

                    let victim = self.stoppable_queue.pop_front().unwrap();
                    trace!(path = %victim, "evicting stoppable worker to make room");
                    if let Some(w) = self.workers.get_mut(&victim) {
                        // No longer queued for eviction; let it rejoin the
                        // rotation the next time it idles out under Start.
                        w.in_stoppable_queue = false;
                    }
                    self.request_stop(&victim);
                    self.schedule_queue.push_front(short_path);
                    continue;
                }
            }
        }
    }

    fn request_start(&mut self, short_path: &Arc<str>) {
        if let Some(worker) = self.workers.get_mut(short_path) {
            worker.control = Control::Start;
            worker.start_cb_pending = true;
        }
        self.tick(short_path);
    }

    fn request_stop(&mut self, short_path: &Arc<str>) {
        if let Some(worker) = self.workers.get_mut(short_path) {
            worker.control = Control::Stop;
            worker.stop_cb_pending = true;
        }
        self.tick(short_path);
    }

    /// Advances one worker's state machine until it reaches a suspension
    /// point (awaiting an async completion) or has nothing further to do.
    fn tick(&mut self, short_path: &Arc<str>) {
        loop {
            let Some(worker) = self.workers.get_mut(short_path) else {
                return;
            };
            if worker.poisoned.is_some() {
                return;
            }

            match (worker.control, worker.state) {
                (Control::Start, WorkerState::Closed) => {
                    worker.state = WorkerState::Opening;
                    self.begin_open(short_path.clone());
                    return;
                }
                (Control::Start, WorkerState::Opening) => return,
                (Control::Start, WorkerState::Opened) => {
                    self.exec_if_ops(short_path);
                    let worker = self.workers.get_mut(short_path).unwrap();
                    if worker.ops.is_empty() && worker.start_cb_pending {
                        worker.start_cb_pending = false;
                        if !worker.in_stoppable_queue {
                            worker.in_stoppable_queue = true;
                            self.stoppable_queue.push_back(short_path.clone());
                        }
                        self.pull();
                    }
                    return;
                }
                (Control::Start, WorkerState::Draining) => {
                    worker.state = WorkerState::Opened;
                    continue;
                }
                (Control::Start, WorkerState::Closing) => return,

                (Control::Stop, WorkerState::Opened) => {
                    self.exec_if_ops(short_path);
                    let worker = self.workers.get_mut(short_path).unwrap();
                    worker.state = WorkerState::Draining;
                    continue;
                }
                (Control::Stop, WorkerState::Draining) => {
                    if worker.in_flight_reads + worker.in_flight_writes == 0 {
                        worker.state = WorkerState::Closing;
                        self.begin_close(short_path.clone());
                    }
                    return;
                }
                (Control::Stop, WorkerState::Opening) | (Control::Stop, WorkerState::Closing) => {
                    return;
                }
                (Control::Stop, WorkerState::Closed) => {
                    if worker.stop_cb_pending {
                        worker.stop_cb_pending = false;
                        if worker.counted {
                            worker.counted = false;
                            self.num_active -= 1;
                        }
                        self.pull();
                    }
                    return;
                }
            }
        }
    }

    /// Dispatches every currently-queued op while the worker can accept it.
    /// Reads and writes are not serialised: each is issued to the OS as soon
    /// as it is popped, without awaiting the previous one's completion.
    fn exec_if_ops(&mut self, short_path: &Arc<str>) {
        let mut ready = Vec::new();
        {
            let worker = self.workers.get_mut(short_path).unwrap();
            while matches!(worker.state, WorkerState::Opened | WorkerState::Draining) {
                let Some(pending) = worker.ops.pop_front() else {
                    break;
                };
                let fd = worker.fd.clone().expect("fd open while Opened/Draining");
                match &pending.op {
                    Op::Read { .. } => worker.in_flight_reads += 1,
                    Op::Write { .. } => worker.in_flight_writes += 1,
                }
                ready.push((pending.op, pending.respond, fd));
            }
        }
        for (op, respond, fd) in ready {
            match op {
                Op::Read { offset, size } => {
                    self.dispatch_read(short_path.clone(), fd, offset, size, respond)
                }
                Op::Write { offset, data } => {
                    self.dispatch_write(short_path.clone(), fd, offset, data, respond)
                }
            }
        }
    }

    fn dispatch_read(
        &self,
        short_path: Arc<str>,
        fd: Arc<std::fs::File>,
        offset: u64,
        size: u32,
        respond: oneshot::Sender<OpResult>,
    ) {
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || io::read_exact_at(&fd, offset, size))
                .await
                .expect("blocking read task panicked");

            let result = match outcome {
                Ok((bytes, n)) if n as u32 == size => Ok(bytes),
                Ok((_, n)) => Err(StoreError::ShortRead {
                    short_path: short_path.to_string(),
                    offset,
                    requested: size,
                    actual: n as u32,
                }),
                Err(source) => Err(StoreError::io(short_path.as_ref(), source)),
            };
            let _ = respond.send(OpResult::Read(result));
            let _ = self_tx.send(Message::IoCompleted {
                short_path,
                kind: IoKind::Read,
            });
        });
    }

    fn dispatch_write(
        &self,
        short_path: Arc<str>,
        fd: Arc<std::fs::File>,
        offset: u64,
        data: bytes::Bytes,
        respond: oneshot::Sender<OpResult>,
    ) {
        let self_tx = self.self_tx.clone();
        let requested = data.len() as u32;
        tokio::spawn(async move {
            let outcome =
                tokio::task::spawn_blocking(move || io::write_at(&fd, offset, &data))
                    .await
                    .expect("blocking write task panicked");

            let result = match outcome {
                Ok(n) if n as u32 == requested => Ok(()),
                Ok(n) => Err(StoreError::ShortWrite {
                    short_path: short_path.to_string(),
                    offset,
                    requested,
                    actual: n as u32,
                }),
                Err(source) => Err(StoreError::io(short_path.as_ref(), source)),
            };
            let _ = respond.send(OpResult::Write(result));
            let _ = self_tx.send(Message::IoCompleted {
                short_path,
                kind: IoKind::Write,
            });
        });
    }

    fn begin_open(&self, short_path: Arc<str>) {
        let dir_ready = self
            .workers
            .get(&short_path)
            .map(|w| w.dir_ready)
            .unwrap_or(false);
        let resolved = self.config.resolve(&short_path);
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let result = match resolved {
                Ok(path) => tokio::task::spawn_blocking(move || {
                    if !dir_ready {
                        io::ensure_parent_dir(&path)?;
                    }
                    io::open_rw_create(&path)
                })
                .await
                .expect("blocking open task panicked"),
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "short path escapes store root",
                )),
            };
            let _ = self_tx.send(Message::OpenCompleted { short_path, result });
        });
    }

    fn begin_close(&mut self, short_path: Arc<str>) {
        let worker = self.workers.get_mut(&short_path).expect("worker exists");
        let fd = worker.fd.take().expect("fd open while Closing");
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                let file = Arc::try_unwrap(fd).unwrap_or_else(|arc| {
                    // Still shared (shouldn't happen once drained); clone the
                    // handle via try_clone to attempt a close anyway.
                    arc.try_clone().expect("failed to clone fd for close")
                });
                io::close(file)
            })
            .await
            .expect("blocking close task panicked");
            let _ = self_tx.send(Message::CloseCompleted { short_path, result });
        });
    }

    fn on_open_completed(&mut self, short_path: Arc<str>, result: Result<std::fs::File, std::io::Error>) {
        match result {
            Ok(file) => {
                if let Some(worker) = self.workers.get_mut(&short_path) {
                    worker.fd = Some(Arc::new(file));
                    worker.dir_ready = true;
                    worker.state = WorkerState::Opened;
                }
                self.tick(&short_path);
            }
            Err(e) => self.poison(&short_path, &format!("open failed: {e}")),
        }
    }

    fn on_close_completed(&mut self, short_path: Arc<str>, result: Result<(), std::io::Error>) {
        match result {
            Ok(()) => {
                if let Some(worker) = self.workers.get_mut(&short_path) {
                    worker.fd = None;
                    worker.state = WorkerState::Closed;
                }
                self.tick(&short_path);
            }
            Err(e) => self.poison(&short_path, &format!("close failed: {e}")),
        }
    }

    fn on_io_completed(&mut self, short_path: Arc<str>, kind: IoKind) {
        if let Some(worker) = self.workers.get_mut(&short_path) {
            match kind {
                IoKind::Read => worker.in_flight_reads = worker.in_flight_reads.saturating_sub(1),
                IoKind::Write => worker.in_flight_writes = worker.in_flight_writes.saturating_sub(1),
            }
        }
        self.tick(&short_path);
    }

    fn poison(&mut self, short_path: &Arc<str>, reason: &str) {
        warn!(path = %short_path, reason, "path worker poisoned");
        let reason_arc: Arc<str> = Arc::from(reason);
        if let Some(worker) = self.workers.get_mut(short_path) {
            worker.poisoned = Some(reason_arc);
            worker.fd = None;
            worker.fail_all_queued(short_path, reason);
            if worker.counted {
                worker.counted = false;
                self.num_active -= 1;
            }
        }
        self.pull();
    }
}
