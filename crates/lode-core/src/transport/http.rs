//! HTTP transport over libcurl.
//!
//! One blocking Easy handle per transfer, run inside `spawn_blocking` so the
//! scheduler task never stalls. Follows redirects; non-2xx responses are
//! failures.

use std::io;
use std::time::Duration;

use super::{FetchFuture, FetchRequest, TransferError, Transport};

/// Transport fetching payloads over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    connect_timeout: Duration,
    timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(120),
        }
    }
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        Self {
            connect_timeout,
            timeout,
        }
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, request: FetchRequest) -> FetchFuture {
        let connect_timeout = self.connect_timeout;
        let timeout = self.timeout;
        Box::pin(async move {
            tokio::task::spawn_blocking(move || fetch_blocking(&request, connect_timeout, timeout))
                .await
                .map_err(|e| {
                    TransferError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
                })?
        })
    }
}

/// Performs one GET and collects the body. Runs on the current thread; call
/// from `spawn_blocking` when used from async code.
fn fetch_blocking(
    request: &FetchRequest,
    connect_timeout: Duration,
    timeout: Duration,
) -> Result<Vec<u8>, TransferError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.connect_timeout(connect_timeout)?;
    easy.timeout(timeout)?;

    if let Some(origin) = &request.cross_origin {
        let mut list = curl::easy::List::new();
        list.append(&format!("Origin: {}", origin.trim()))?;
        easy.http_headers(list)?;
    }

    let mut body: Vec<u8> = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }

    Ok(body)
}
