//! The batch loader: pools, admission, reclamation, completion.
//!
//! Files are registered while the loader is idle, then `start()` drives one
//! session: up to `max_parallel_downloads` transports run at once, each
//! outcome is reclaimed on the session task (one serialization point for all
//! pool mutations), freed slots are backfilled from the pending pool, and the
//! session completes when nothing is pending or in flight.

mod control;
mod handle;
mod progress;

pub use control::SessionControl;
pub use handle::LoadHandle;
pub use progress::Progress;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;

use crate::config::LoaderConfig;
use crate::error::{LoadFailure, LoaderError};
use crate::file::{AssetFile, FileState, Settlement};
use crate::locator;
use crate::transport::{FetchRequest, TransferError, Transport};

use self::handle::Settled;

/// Coarse session state gating what the loader accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Processing,
    Complete,
    Shutdown,
    Destroyed,
}

/// Outcome of one completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// A registered file together with its settlement channel.
struct FileSlot {
    id: u64,
    file: AssetFile,
    settle: oneshot::Sender<Settled>,
}

type TransportTasks = JoinSet<(u64, Result<Vec<u8>, TransferError>)>;

/// Bounded-concurrency batch loader over a pluggable transport.
pub struct Loader {
    transport: Arc<dyn Transport>,
    config: LoaderConfig,
    state: SessionState,
    next_id: u64,
    /// Fixed at session start from the pending-pool size.
    total_to_load: usize,
    pending: VecDeque<FileSlot>,
    in_flight: HashMap<u64, FileSlot>,
    succeeded: Vec<AssetFile>,
    failed: Vec<AssetFile>,
    progress_tx: watch::Sender<Progress>,
    control: Arc<SessionControl>,
}

impl Loader {
    pub fn new(transport: Arc<dyn Transport>, config: LoaderConfig) -> Self {
        let (progress_tx, _) = watch::channel(Progress::default());
        Self {
            transport,
            config: config.normalized(),
            state: SessionState::Idle,
            next_id: 0,
            total_to_load: 0,
            pending: VecDeque::new(),
            in_flight: HashMap::new(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            progress_tx,
            control: Arc::new(SessionControl::new()),
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SessionState::Loading | SessionState::Processing)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Idle | SessionState::Complete)
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Fraction of the current session's files no longer outstanding. Zero
    /// before the first session.
    pub fn progress(&self) -> f64 {
        match self.state {
            SessionState::Idle => 0.0,
            _ => self.progress_tx.borrow().fraction(),
        }
    }

    /// Watch channel receiving a pool snapshot at every admission and
    /// reclamation event.
    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.progress_tx.subscribe()
    }

    /// Live pool counts (all empty once a session has completed).
    pub fn counts(&self) -> Progress {
        Progress {
            pending: self.pending.len(),
            in_flight: self.in_flight.len(),
            succeeded: self.succeeded.len(),
            failed: self.failed.len(),
            total: self.total_to_load,
        }
    }

    /// Abort control for the running (or next) session.
    pub fn control(&self) -> Arc<SessionControl> {
        Arc::clone(&self.control)
    }

    fn ensure_ready(&self, operation: &'static str) -> Result<(), LoaderError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(LoaderError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Sets the prefix prepended to every relative locator, trailing-slash
    /// normalized. Like all setters, only valid while no session is active.
    pub fn set_base_url(&mut self, value: &str) -> Result<&mut Self, LoaderError> {
        self.ensure_ready("set_base_url")?;
        self.config.base_url = locator::ensure_trailing_slash(value);
        Ok(self)
    }

    /// Sets the secondary prefix appended after the base URL.
    pub fn set_path(&mut self, value: &str) -> Result<&mut Self, LoaderError> {
        self.ensure_ready("set_path")?;
        self.config.path = locator::ensure_trailing_slash(value);
        Ok(self)
    }

    /// Sets the key prefix label. No effect on scheduling.
    pub fn set_prefix(&mut self, value: &str) -> Result<&mut Self, LoaderError> {
        self.ensure_ready("set_prefix")?;
        self.config.prefix = value.to_string();
        Ok(self)
    }

    /// Sets the batch label. No effect on scheduling.
    pub fn set_file_group(&mut self, value: &str) -> Result<&mut Self, LoaderError> {
        self.ensure_ready("set_file_group")?;
        self.config.file_group = value.to_string();
        Ok(self)
    }

    /// Sets the cap on simultaneous in-flight transfers.
    pub fn set_max_parallel_downloads(&mut self, value: usize) -> Result<&mut Self, LoaderError> {
        self.ensure_ready("set_max_parallel_downloads")?;
        self.config.max_parallel_downloads = value.max(1);
        Ok(self)
    }

    /// Sets the cross-origin policy handed through to the transport.
    pub fn set_cross_origin(&mut self, value: Option<String>) -> Result<&mut Self, LoaderError> {
        self.ensure_ready("set_cross_origin")?;
        self.config.cross_origin = value;
        Ok(self)
    }

    /// Registers a file for the next session and returns its handle.
    pub fn register(&mut self, key: &str, url: &str) -> Result<LoadHandle, LoaderError> {
        self.add_file(key, url, "binary")
    }

    /// Registers an image file (the declared kind is opaque to scheduling).
    pub fn image(&mut self, key: &str, url: &str) -> Result<LoadHandle, LoaderError> {
        self.add_file(key, url, "image")
    }

    /// Registers a file with an explicit kind.
    pub fn add_file(&mut self, key: &str, url: &str, kind: &str) -> Result<LoadHandle, LoaderError> {
        self.ensure_ready("register")?;
        Ok(self.enqueue(AssetFile::new(key, url, kind)))
    }

    /// Registers a file whose payload is already at hand; it completes at
    /// admission without a transport round-trip.
    pub fn add_populated(
        &mut self,
        key: &str,
        kind: &str,
        data: Vec<u8>,
    ) -> Result<LoadHandle, LoaderError> {
        self.ensure_ready("register")?;
        Ok(self.enqueue(AssetFile::populated(key, kind, data)))
    }

    fn enqueue(&mut self, file: AssetFile) -> LoadHandle {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id;
        self.next_id += 1;
        let handle = LoadHandle::new(file.key.clone(), file.url.clone(), rx);
        tracing::debug!(key = %file.key, url = %file.url, "file registered");
        self.pending.push_back(FileSlot {
            id,
            file,
            settle: tx,
        });
        handle
    }

    /// Runs one session over everything registered since the last one.
    ///
    /// Admits files up to the cap, reclaims each transport outcome on this
    /// task, backfills freed slots, and completes when nothing is pending or
    /// in flight. Partial failure never aborts the batch; the summary counts
    /// both outcomes. Returns `LoaderError::InvalidState` unless the loader
    /// is idle or complete, and `LoaderError::Aborted` if the session's
    /// `SessionControl` fires.
    pub async fn start(&mut self) -> Result<SessionSummary, LoaderError> {
        self.ensure_ready("start")?;
        self.control.reset();
        let cancel = self.control.current();

        self.in_flight.clear();
        self.succeeded.clear();
        self.failed.clear();
        self.total_to_load = self.pending.len();

        if self.total_to_load == 0 {
            self.state = SessionState::Complete;
            self.publish_progress();
            tracing::info!("no files registered; session complete");
            return Ok(SessionSummary {
                total: 0,
                succeeded: 0,
                failed: 0,
            });
        }

        self.state = SessionState::Loading;
        self.publish_progress();
        tracing::info!(
            total = self.total_to_load,
            cap = self.config.max_parallel_downloads.max(1),
            "session started"
        );

        let mut tasks: TransportTasks = JoinSet::new();
        loop {
            if cancel.is_cancelled() {
                return self.tear_down(&mut tasks, LoaderError::Aborted).await;
            }
            self.admit(&mut tasks);
            self.publish_progress();
            if self.pending.is_empty() && self.in_flight.is_empty() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    return self.tear_down(&mut tasks, LoaderError::Aborted).await;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((id, outcome))) => self.reclaim(id, outcome),
                    Some(Err(err)) => {
                        return self
                            .tear_down(&mut tasks, LoaderError::Task(err.to_string()))
                            .await;
                    }
                    None => {}
                },
            }
        }

        Ok(self.complete())
    }

    /// Admission scan. The pending pool is snapshotted before iterating:
    /// admitting an entry removes it from the set being scanned, and the
    /// snapshot keeps the walk in registration order without skips.
    fn admit(&mut self, tasks: &mut TransportTasks) {
        let cap = self.config.max_parallel_downloads.max(1);
        let snapshot: Vec<FileSlot> = self.pending.drain(..).collect();
        for slot in snapshot {
            match slot.file.state() {
                // Populated files never touch the transport, so the cap does
                // not gate them.
                FileState::Populated => self.complete_populated(slot),
                FileState::Pending if self.in_flight.len() < cap => self.dispatch(slot, tasks),
                _ => self.pending.push_back(slot),
            }
        }
    }

    fn dispatch(&mut self, mut slot: FileSlot, tasks: &mut TransportTasks) {
        slot.file.begin_load();
        let request = FetchRequest {
            key: slot.file.key.clone(),
            url: locator::resolve(&self.config.base_url, &self.config.path, &slot.file.url),
            cross_origin: self.config.cross_origin.clone(),
        };
        tracing::debug!(key = %slot.file.key, url = %request.url, "file admitted");
        let transport = Arc::clone(&self.transport);
        let id = slot.id;
        tasks.spawn(async move { (id, transport.fetch(request).await) });
        self.in_flight.insert(id, slot);
    }

    fn complete_populated(&mut self, mut slot: FileSlot) {
        tracing::debug!(key = %slot.file.key, "populated file complete");
        if slot.file.on_complete() == Some(Settlement::Fulfill) {
            let _ = slot.settle.send(Ok(slot.file.clone()));
        }
        self.succeeded.push(slot.file);
    }

    /// Reclamation: the outcome for one in-flight file arrived. Moves it to
    /// the succeeded or failed pool and settles its handle; the caller's
    /// loop backfills the freed slot on the next admission pass.
    fn reclaim(&mut self, id: u64, outcome: Result<Vec<u8>, TransferError>) {
        let Some(mut slot) = self.in_flight.remove(&id) else {
            return;
        };
        match outcome {
            Ok(bytes) => {
                tracing::debug!(key = %slot.file.key, bytes = bytes.len(), "file loaded");
                slot.file.supply(bytes);
                if slot.file.on_load() == Some(Settlement::Fulfill) {
                    let _ = slot.settle.send(Ok(slot.file.clone()));
                }
                self.succeeded.push(slot.file);
            }
            Err(error) => {
                tracing::warn!(key = %slot.file.key, error = %error, "file failed");
                let settlement = slot.file.on_error();
                if settlement == Some(Settlement::Reject) {
                    let _ = slot.settle.send(Err(LoadFailure::new(&slot.file, error)));
                }
                self.failed.push(slot.file);
            }
        }
        self.publish_progress();
    }

    /// Completion: dispose failed files, publish the final snapshot, clear
    /// the pools, and mark the session complete.
    fn complete(&mut self) -> SessionSummary {
        for file in &mut self.failed {
            file.on_destroy();
        }
        self.publish_progress();
        let summary = SessionSummary {
            total: self.total_to_load,
            succeeded: self.succeeded.len(),
            failed: self.failed.len(),
        };
        self.pending.clear();
        self.in_flight.clear();
        self.succeeded.clear();
        self.failed.clear();
        self.state = SessionState::Complete;
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "session complete"
        );
        summary
    }

    /// Abandons the session: stops the transport tasks, rejects every
    /// outstanding handle exactly once, and leaves the loader in `Shutdown`.
    async fn tear_down(
        &mut self,
        tasks: &mut TransportTasks,
        error: LoaderError,
    ) -> Result<SessionSummary, LoaderError> {
        tracing::warn!(error = %error, "session torn down");
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        for mut slot in self.take_outstanding() {
            if slot.file.on_error() == Some(Settlement::Reject) {
                let _ = slot
                    .settle
                    .send(Err(LoadFailure::new(&slot.file, TransferError::Aborted)));
            }
            self.failed.push(slot.file);
        }
        self.state = SessionState::Shutdown;
        self.publish_progress();
        Err(error)
    }

    fn take_outstanding(&mut self) -> Vec<FileSlot> {
        let mut slots: Vec<FileSlot> = self.pending.drain(..).collect();
        slots.extend(self.in_flight.drain().map(|(_, slot)| slot));
        slots
    }

    /// Explicit teardown outside a running session: moves to `Shutdown` so no
    /// further session can start.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        self.state = SessionState::Shutdown;
    }

    /// Terminal teardown: rejects outstanding handles, destroys every held
    /// file, and empties the pools.
    pub fn destroy(&mut self) {
        for mut slot in self.take_outstanding() {
            if slot.file.on_error() == Some(Settlement::Reject) {
                let _ = slot
                    .settle
                    .send(Err(LoadFailure::new(&slot.file, TransferError::Aborted)));
            }
            slot.file.on_destroy();
        }
        for file in &mut self.succeeded {
            file.on_destroy();
        }
        for file in &mut self.failed {
            file.on_destroy();
        }
        self.succeeded.clear();
        self.failed.clear();
        self.state = SessionState::Destroyed;
    }

    fn publish_progress(&self) {
        self.progress_tx.send_replace(self.counts());
    }
}
