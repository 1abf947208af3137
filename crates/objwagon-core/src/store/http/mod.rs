//! HTTP backends (GCS JSON API, S3 REST API) over libcurl.
//!
//! Each call runs one blocking curl easy transfer on the calling thread.
//! Response bodies stream straight into the caller's sink while the status is
//! 2xx; error bodies are captured separately so the backend can extract the
//! provider's error code without corrupting the destination.

mod gcs;
mod s3;

pub use gcs::{GcsStore, GCS_ENDPOINT};
pub use s3::{S3Store, S3_ENDPOINT};

use super::{BackendKind, ProviderError, StoreError};
use std::cell::{Cell, RefCell};
use std::io::{self, Read, Write};
use std::time::Duration;
use url::Url;

/// Cap on captured error bodies.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Head,
    Post,
    Put,
}

/// Outcome of one HTTP exchange whose transport succeeded.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub status: u32,
    pub headers: Vec<String>,
    /// Body of a non-2xx response (truncated).
    pub error_body: Vec<u8>,
}

impl Exchange {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}

/// Upload body for a request.
pub(crate) struct Body<'a> {
    pub source: &'a mut dyn Read,
    pub size: u64,
    pub content_type: &'a str,
}

/// Connection settings shared by both dialects.
#[derive(Debug, Clone)]
pub(crate) struct HttpSettings {
    pub backend: BackendKind,
    pub bearer_token: Option<String>,
    pub connect_timeout: Duration,
}

impl HttpSettings {
    pub fn new(backend: BackendKind, bearer_token: Option<String>) -> Self {
        Self {
            backend,
            bearer_token,
            connect_timeout: Duration::from_secs(30),
        }
    }

    fn transport_error(&self, err: curl::Error) -> StoreError {
        ProviderError::new(self.backend, None, err.to_string()).into()
    }

    /// Perform one request. Transport failures become status-less provider
    /// errors; sink/source failures become `StoreError::Io`.
    pub fn perform(
        &self,
        method: Method,
        url: &Url,
        extra_headers: &[String],
        body: Option<Body<'_>>,
        sink: &mut dyn Write,
    ) -> Result<Exchange, StoreError> {
        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy, method, url, extra_headers, body.as_ref())
            .map_err(|e| self.transport_error(e))?;

        let status = Cell::new(0u32);
        let headers = RefCell::new(Vec::new());
        let error_body = RefCell::new(Vec::new());
        let sink_error: RefCell<Option<io::Error>> = RefCell::new(None);
        let source_error: RefCell<Option<io::Error>> = RefCell::new(None);
        let mut source = body.map(|b| b.source);

        let result = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    let line = String::from_utf8_lossy(data).trim_end().to_string();
                    if line.starts_with("HTTP/") {
                        // New status line (e.g. after 100 Continue): reset headers.
                        let code = line
                            .split_whitespace()
                            .nth(1)
                            .and_then(|c| c.parse::<u32>().ok())
                            .unwrap_or(0);
                        status.set(code);
                        headers.borrow_mut().clear();
                    } else if !line.is_empty() {
                        headers.borrow_mut().push(line);
                    }
                    true
                })
                .map_err(|e| self.transport_error(e))?;
            transfer
                .write_function(|data| {
                    if !(200..300).contains(&status.get()) {
                        let mut buf = error_body.borrow_mut();
                        let room = MAX_ERROR_BODY.saturating_sub(buf.len());
                        buf.extend_from_slice(&data[..data.len().min(room)]);
                        return Ok(data.len());
                    }
                    match sink.write_all(data) {
                        Ok(()) => Ok(data.len()),
                        Err(e) => {
                            sink_error.borrow_mut().replace(e);
                            Ok(0)
                        }
                    }
                })
                .map_err(|e| self.transport_error(e))?;
            if let Some(src) = source.as_mut() {
                let source_error = &source_error;
                transfer
                    .read_function(move |buf| match src.read(buf) {
                        Ok(n) => Ok(n),
                        Err(e) => {
                            source_error.borrow_mut().replace(e);
                            Err(curl::easy::ReadError::Abort)
                        }
                    })
                    .map_err(|e| self.transport_error(e))?;
            }
            transfer.perform()
        };

        if let Err(e) = result {
            if let Some(io_err) = sink_error.into_inner() {
                return Err(StoreError::Io(io_err));
            }
            if let Some(io_err) = source_error.into_inner() {
                return Err(StoreError::Io(io_err));
            }
            return Err(self.transport_error(e));
        }

        let code = easy.response_code().map_err(|e| self.transport_error(e))?;
        Ok(Exchange {
            status: code,
            headers: headers.into_inner(),
            error_body: error_body.into_inner(),
        })
    }

    fn configure(
        &self,
        easy: &mut curl::easy::Easy,
        method: Method,
        url: &Url,
        extra_headers: &[String],
        body: Option<&Body<'_>>,
    ) -> Result<(), curl::Error> {
        easy.url(url.as_str())?;
        easy.connect_timeout(self.connect_timeout)?;
        // Abort if throughput stays below 1 KiB/s for 60s rather than imposing a wall-clock limit.
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(60))?;

        let mut list = curl::easy::List::new();
        // Disable `Expect: 100-continue` round trips on uploads.
        list.append("Expect:")?;
        if let Some(token) = &self.bearer_token {
            list.append(&format!("Authorization: Bearer {}", token))?;
        }
        for h in extra_headers {
            list.append(h)?;
        }

        match method {
            Method::Get => easy.get(true)?,
            Method::Head => easy.nobody(true)?,
            Method::Post => {
                easy.post(true)?;
                easy.post_field_size(body.map_or(0, |b| b.size))?;
            }
            Method::Put => {
                easy.upload(true)?;
                easy.in_filesize(body.map_or(0, |b| b.size))?;
            }
        }
        if let Some(b) = body {
            list.append(&format!("Content-Type: {}", b.content_type))?;
        }
        easy.http_headers(list)?;
        Ok(())
    }
}

/// Build `base` with `segments` appended to its path, each percent-encoded
/// as a single segment.
pub(crate) fn url_with_segments<'a>(
    backend: BackendKind,
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, StoreError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ProviderError::new(backend, None, format!("not a base URL: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parse and check an endpoint URL.
pub(crate) fn parse_endpoint(endpoint: &str) -> anyhow::Result<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| anyhow::anyhow!("invalid endpoint URL {}: {}", endpoint, e))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("endpoint must be an http(s) URL: {}", endpoint);
    }
    Ok(url)
}
