//! Errors raised by object-store backends.

use super::BackendKind;
use thiserror::Error;

/// Failure reported by (or on the way to) an object-store provider.
///
/// Every backend adapts its native errors into this shape so a single
/// classifier can map them. `status` is the HTTP status, or the closest
/// equivalent, when the provider answered; transport failures leave it `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{backend} request failed{}: {message}", status_suffix(.status, .code))]
pub struct ProviderError {
    pub backend: BackendKind,
    pub status: Option<u16>,
    /// Provider-specific error code (e.g. `NoSuchKey`), when reported.
    pub code: Option<String>,
    pub message: String,
}

fn status_suffix(status: &Option<u16>, code: &Option<String>) -> String {
    match (status, code) {
        (Some(s), Some(c)) => format!(" ({} {})", s, c),
        (Some(s), None) => format!(" ({})", s),
        (None, Some(c)) => format!(" ({})", c),
        (None, None) => String::new(),
    }
}

impl ProviderError {
    pub fn new(backend: BackendKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            backend,
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Error from a store call: the provider failed, or the local sink/source did.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("local I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
