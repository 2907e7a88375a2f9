use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::handle::PathHandle;
use crate::scheduler::{Message, SchedulerActor};

/// Directory-scoped registry of path workers, bounding the number of
/// concurrently open OS file descriptors to `config.max_open_files`.
///
/// Cloning a `Store` is cheap: it is a handle onto the same scheduler task
/// and handle table.
#[derive(Clone)]
pub struct Store {
    config: Arc<StoreConfig>,
    handles: Arc<DashMap<Arc<str>, PathHandle>>,
    sender: mpsc::UnboundedSender<Message>,
}

impl Store {
    /// Constructs a new store. Spawns the scheduler's event loop as a tokio
    /// task; must be called from within a tokio runtime.
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        info!(
            dir_path = %config.dir_path.display(),
            max_open_files = config.max_open_files,
            "starting bounded-fd file store"
        );
        let sender = SchedulerActor::spawn(config.clone());
        Ok(Self {
            config: Arc::new(config),
            handles: Arc::new(DashMap::new()),
            sender,
        })
    }

    /// The configuration this store was constructed with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the memoised handle for `short_path`, creating it and its
    /// backing worker on first request. Idempotent and safe to call
    /// concurrently from multiple tasks.
    pub fn storage_for(&self, short_path: impl AsRef<str>) -> PathHandle {
        let short_path: Arc<str> = Arc::from(short_path.as_ref());
        self.handles
            .entry(short_path.clone())
            .or_insert_with(|| {
                // Fire-and-forget: the worker table is keyed the same as the
                // handle table from this point on, not just from the first
                // submitted op. If the scheduler task has already shut down
                // there's nothing to ensure and nothing to do about it here;
                // the first real `read`/`write` will surface that failure.
                let _ = self.sender.send(Message::EnsureWorker {
                    short_path: short_path.clone(),
                });
                PathHandle::new(short_path, self.sender.clone())
            })
            .clone()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("dir_path", &self.config.dir_path)
            .field("max_open_files", &self.config.max_open_files)
            .field("open_handles", &self.handles.len())
            .finish()
    }
}
