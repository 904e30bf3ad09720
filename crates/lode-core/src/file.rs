//! Per-file transfer state machine.
//!
//! One `AssetFile` tracks one requested asset through its lifecycle:
//! `Pending → Loading → Loaded → Processing → Complete` on success,
//! `Loading → Failed` on transport failure. `Populated` marks a file whose
//! payload was supplied up front (no transport round-trip); `Destroyed` is
//! terminal. Transitions are idempotent and funneled through a single
//! notification point so settlement fires at most once per file.

/// Lifecycle state of one registered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Loading,
    Loaded,
    Processing,
    Complete,
    Failed,
    /// Payload supplied at registration; eligible for immediate admission.
    Populated,
    Destroyed,
}

/// Signal returned by the notification point when a file first reaches a
/// settling state. The loader performs the actual settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Fulfill,
    Reject,
}

/// One tracked asset: identity, locator, declared kind, payload, and state.
///
/// The declared kind is opaque to the scheduler; it exists for consumers that
/// decode payloads after the fact. Keys are caller-assigned and not required
/// to be unique.
#[derive(Debug, Clone)]
pub struct AssetFile {
    pub key: String,
    pub url: String,
    pub kind: String,
    /// Absent until the transport delivers (or the file was populated).
    pub data: Option<Vec<u8>>,
    state: FileState,
    settled: bool,
}

impl AssetFile {
    pub fn new(key: impl Into<String>, url: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            kind: kind.into(),
            data: None,
            state: FileState::Pending,
            settled: false,
        }
    }

    /// A file whose payload is already at hand; admission completes it
    /// without invoking the transport.
    pub fn populated(key: impl Into<String>, kind: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            url: String::new(),
            kind: kind.into(),
            data: Some(data),
            state: FileState::Populated,
            settled: false,
        }
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    /// The single state-change notification point. Re-entering the current
    /// state is a no-op; the first arrival at `Complete` or `Failed` yields
    /// the settlement signal, later arrivals never do.
    fn transition(&mut self, next: FileState) -> Option<Settlement> {
        if self.state == next {
            return None;
        }
        self.state = next;
        match next {
            FileState::Complete if !self.settled => {
                self.settled = true;
                Some(Settlement::Fulfill)
            }
            FileState::Failed if !self.settled => {
                self.settled = true;
                Some(Settlement::Reject)
            }
            _ => None,
        }
    }

    /// Marks the transport call as started (`Pending → Loading`).
    pub(crate) fn begin_load(&mut self) {
        let _ = self.transition(FileState::Loading);
    }

    /// Attaches the delivered payload.
    pub(crate) fn supply(&mut self, data: Vec<u8>) {
        self.data = Some(data);
    }

    /// Transport success hook. A specialized file kind that overrides this
    /// behavior must set `Loaded` before returning; the plain file advances
    /// straight through to `Complete`.
    pub fn on_load(&mut self) -> Option<Settlement> {
        let _ = self.transition(FileState::Loaded);
        self.transition(FileState::Complete)
    }

    /// Transport failure hook; must leave the file in `Failed`.
    pub fn on_error(&mut self) -> Option<Settlement> {
        self.transition(FileState::Failed)
    }

    /// Post-load processing hook; must leave the file in `Processing`.
    pub fn on_process(&mut self) -> Option<Settlement> {
        self.transition(FileState::Processing)
    }

    /// Completion hook; must leave the file in `Complete`.
    pub fn on_complete(&mut self) -> Option<Settlement> {
        self.transition(FileState::Complete)
    }

    /// Disposal hook; must leave the file in `Destroyed`. Releases the payload.
    pub fn on_destroy(&mut self) {
        self.data = None;
        let _ = self.transition(FileState::Destroyed);
    }
}
