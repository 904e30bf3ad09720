//! Loader error types.

use crate::file::{AssetFile, FileState};
use crate::loader::SessionState;
use crate::transport::TransferError;

/// Error returned by loader operations themselves (not per-file outcomes).
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The operation was called in a session state that does not allow it,
    /// e.g. `register` or `start` while a session is already loading.
    #[error("{operation} requires an idle or complete loader (session state: {state:?})")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    /// The running session was aborted via its `SessionControl`.
    #[error("session aborted")]
    Aborted,
    /// A transport task panicked or was torn down by the runtime.
    #[error("transport task failed: {0}")]
    Task(String),
}

/// Rejection payload of a registration handle: which file failed, where it
/// was fetched from, the state it ended in, and the transport error.
#[derive(Debug, thiserror::Error)]
#[error("'{key}' failed to load from '{url}' ({state:?}): {error}")]
pub struct LoadFailure {
    pub key: String,
    pub url: String,
    pub state: FileState,
    #[source]
    pub error: TransferError,
}

impl LoadFailure {
    pub(crate) fn new(file: &AssetFile, error: TransferError) -> Self {
        Self {
            key: file.key.clone(),
            url: file.url.clone(),
            state: file.state(),
            error,
        }
    }
}
