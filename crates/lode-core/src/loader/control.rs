//! Session abort control.
//!
//! A `SessionControl` is shared between the caller and a running session.
//! Requesting abort stops further admissions, abandons in-flight transports,
//! and settles every outstanding handle exactly once; the session ends in
//! `Shutdown`.

use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Abort token for the loader's current (or next) session.
#[derive(Debug, Default)]
pub struct SessionControl {
    token: Mutex<CancellationToken>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests abort of the session this token currently covers.
    pub fn request_abort(&self) {
        self.token.lock().unwrap().cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.lock().unwrap().is_cancelled()
    }

    /// Swaps in a fresh token; called when a new session starts so an abort
    /// only ever covers one session.
    pub(crate) fn reset(&self) {
        *self.token.lock().unwrap() = CancellationToken::new();
    }

    /// Token covering the current session, for awaiting cancellation.
    pub(crate) fn current(&self) -> CancellationToken {
        self.token.lock().unwrap().clone()
    }
}
