//! In-memory transport: serves payloads from a map, keyed by resolved URL.
//!
//! Useful for tests and for embedding the loader where assets are bundled
//! into the binary. A missing entry reports HTTP 404 so callers exercise the
//! same failure path as a real server.

use std::collections::HashMap;

use super::{FetchFuture, FetchRequest, TransferError, Transport};

#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a payload under its locator.
    pub fn insert(&mut self, url: impl Into<String>, payload: Vec<u8>) -> &mut Self {
        self.entries.insert(url.into(), payload);
        self
    }
}

impl Transport for MemoryTransport {
    fn fetch(&self, request: FetchRequest) -> FetchFuture {
        let outcome = match self.entries.get(&request.url) {
            Some(payload) => Ok(payload.clone()),
            None => Err(TransferError::Http(404)),
        };
        Box::pin(async move { outcome })
    }
}
