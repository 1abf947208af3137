//! Uniform transfer error taxonomy shared by every backend.

use crate::store::ProviderError;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Underlying cause of a failed transfer, kept inspectable through `source()`.
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// Outcome of a failed transfer, classified for retry decisions.
///
/// `PermissionDenied` and `NotFound` are terminal: retrying cannot change the
/// answer. `TransferFailed` covers network errors, unrecognized provider
/// errors, local file errors and exhausted retries.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    #[error("{message}")]
    PermissionDenied {
        key: String,
        message: String,
        #[source]
        source: ProviderError,
    },
    #[error("'{key}' does not exist")]
    NotFound {
        key: String,
        #[source]
        source: Option<ProviderError>,
    },
    #[error("{message}")]
    TransferFailed {
        key: String,
        message: String,
        #[source]
        source: Option<Cause>,
    },
}

/// Variant tag of a [`TransferError`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferErrorKind {
    PermissionDenied,
    NotFound,
    TransferFailed,
}

impl TransferError {
    /// `TransferFailed` without an underlying cause.
    pub fn failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        TransferError::TransferFailed {
            key: key.into(),
            message: message.into(),
            source: None,
        }
    }

    /// `TransferFailed` wrapping `cause`.
    pub fn failed_with<E>(key: impl Into<String>, message: impl Into<String>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        TransferError::TransferFailed {
            key: key.into(),
            message: message.into(),
            source: Some(Arc::new(cause)),
        }
    }

    /// `NotFound` for an object that is simply absent (no provider error involved).
    pub fn not_found(key: impl Into<String>) -> Self {
        TransferError::NotFound {
            key: key.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> TransferErrorKind {
        match self {
            TransferError::PermissionDenied { .. } => TransferErrorKind::PermissionDenied,
            TransferError::NotFound { .. } => TransferErrorKind::NotFound,
            TransferError::TransferFailed { .. } => TransferErrorKind::TransferFailed,
        }
    }

    /// Resource key the failed operation addressed.
    pub fn key(&self) -> &str {
        match self {
            TransferError::PermissionDenied { key, .. }
            | TransferError::NotFound { key, .. }
            | TransferError::TransferFailed { key, .. } => key,
        }
    }
}

fn cause_text(cause: &Option<Cause>) -> Option<String> {
    cause.as_ref().map(|c| c.to_string())
}

/// Value equality: same variant, key, message and cause. Causes that are not
/// provider errors are compared by their rendered text.
impl PartialEq for TransferError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                TransferError::PermissionDenied {
                    key: a,
                    message: am,
                    source: asrc,
                },
                TransferError::PermissionDenied {
                    key: b,
                    message: bm,
                    source: bsrc,
                },
            ) => a == b && am == bm && asrc == bsrc,
            (
                TransferError::NotFound { key: a, source: asrc },
                TransferError::NotFound { key: b, source: bsrc },
            ) => a == b && asrc == bsrc,
            (
                TransferError::TransferFailed {
                    key: a,
                    message: am,
                    source: asrc,
                },
                TransferError::TransferFailed {
                    key: b,
                    message: bm,
                    source: bsrc,
                },
            ) => a == b && am == bm && cause_text(asrc) == cause_text(bsrc),
            _ => false,
        }
    }
}

impl Eq for TransferError {}
