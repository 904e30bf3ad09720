//! Transport seam: one fetch per file, exactly one outcome.
//!
//! The scheduler is agnostic to transfer mechanics. Anything that can take a
//! resolved locator and produce bytes or a `TransferError` exactly once can
//! drive it: HTTP via libcurl (`HttpTransport`), an in-memory map
//! (`MemoryTransport`), or a test double.

mod http;
mod memory;

pub use http::HttpTransport;
pub use memory::MemoryTransport;

use std::future::Future;
use std::pin::Pin;

/// What the loader hands the transport for one admitted file.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Caller-assigned key, for logging and diagnostics only.
    pub key: String,
    /// Fully resolved locator (prefixes applied, or absolute passthrough).
    pub url: String,
    /// Cross-origin policy from the loader config; interpretation is the
    /// transport's business.
    pub cross_origin: Option<String>,
}

/// Error reported by a transport for one transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// libcurl reported an error (timeout, connection, DNS, ...).
    #[error(transparent)]
    Curl(#[from] curl::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Local I/O failed while handling the transfer.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    /// The session was shut down before the transfer settled.
    #[error("transfer aborted")]
    Aborted,
}

/// Future returned by a transport fetch.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send>>;

/// Performs the byte transfer for one file.
///
/// Implementations must deliver exactly one outcome per call: either the full
/// payload or a `TransferError`. The loader serializes outcome handling, so
/// implementations are free to run on any thread.
pub trait Transport: Send + Sync {
    fn fetch(&self, request: FetchRequest) -> FetchFuture;
}
