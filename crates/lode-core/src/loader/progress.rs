//! Progress snapshots over the loader's pools.
//!
//! Published on a watch channel at every admission and reclamation event, so
//! a consumer can render a bar or assert the pool invariants without touching
//! the loader itself.

/// Pool cardinalities of the current session at one observable instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Registered, not yet admitted.
    pub pending: usize,
    /// Transport active; never exceeds the configured cap.
    pub in_flight: usize,
    /// Settled successfully, awaiting cleanup.
    pub succeeded: usize,
    /// Settled with a transfer failure, awaiting cleanup.
    pub failed: usize,
    /// Snapshot of the registered-file count taken at session start.
    pub total: usize,
}

impl Progress {
    /// Fraction of files no longer pending or in flight, in [0, 1].
    /// A session with nothing to load reports 1.0, not NaN.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        1.0 - (self.pending + self.in_flight) as f64 / self.total as f64
    }

    /// Files that have reached a terminal outcome.
    pub fn settled(&self) -> usize {
        self.succeeded + self.failed
    }
}
