//! Scripted in-memory transport for scheduler tests.
//!
//! Each locator maps to a scripted outcome; every fetch sleeps for a fixed
//! delay so transfers overlap, and the transport records how many run
//! concurrently so tests can assert the cap is honored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lode_core::transport::{FetchFuture, FetchRequest, TransferError, Transport};

#[derive(Debug, Clone)]
pub enum Script {
    Deliver(Vec<u8>),
    Fail(u32),
}

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<HashMap<String, Script>>,
    delay: Mutex<Duration>,
    current: AtomicUsize,
    max_concurrent: AtomicUsize,
    calls: AtomicUsize,
}

#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        let transport = Self::default();
        *transport.inner.delay.lock().unwrap() = delay;
        transport
    }

    pub fn script(&self, url: &str, script: Script) -> &Self {
        self.inner
            .entries
            .lock()
            .unwrap()
            .insert(url.to_string(), script);
        self
    }

    /// Highest number of fetches that were in flight at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent.load(Ordering::SeqCst)
    }

    /// Total number of fetches started.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn fetch(&self, request: FetchRequest) -> FetchFuture {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            inner.calls.fetch_add(1, Ordering::SeqCst);
            let now = inner.current.fetch_add(1, Ordering::SeqCst) + 1;
            inner.max_concurrent.fetch_max(now, Ordering::SeqCst);

            let delay = *inner.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            inner.current.fetch_sub(1, Ordering::SeqCst);
            let script = inner.entries.lock().unwrap().get(&request.url).cloned();
            match script {
                Some(Script::Deliver(bytes)) => Ok(bytes),
                Some(Script::Fail(code)) => Err(TransferError::Http(code)),
                None => Err(TransferError::Http(404)),
            }
        })
    }
}
