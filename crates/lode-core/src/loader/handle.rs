//! Registration future: one handle per registered file.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::LoadFailure;
use crate::file::{AssetFile, FileState};
use crate::transport::TransferError;

pub(super) type Settled = Result<AssetFile, LoadFailure>;

/// Future returned by registration. Resolves with the loaded file when it
/// reaches `Complete`, or with a `LoadFailure` when it reaches `Failed`.
/// Settles at most once; if the loader is dropped or destroyed before the
/// file settles, the handle rejects with `TransferError::Aborted`.
#[derive(Debug)]
pub struct LoadHandle {
    key: String,
    url: String,
    rx: oneshot::Receiver<Settled>,
}

impl LoadHandle {
    pub(super) fn new(key: String, url: String, rx: oneshot::Receiver<Settled>) -> Self {
        Self { key, url, rx }
    }

    /// Key of the file this handle tracks.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Future for LoadHandle {
    type Output = Settled;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|settled| match settled {
            Ok(outcome) => outcome,
            // Sender dropped without settling: the loader went away.
            Err(_) => Err(LoadFailure {
                key: this.key.clone(),
                url: this.url.clone(),
                state: FileState::Destroyed,
                error: TransferError::Aborted,
            }),
        })
    }
}
