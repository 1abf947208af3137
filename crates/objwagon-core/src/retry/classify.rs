//! Classify provider and store errors into the transfer error taxonomy.

use super::error::TransferError;
use crate::store::{ProviderError, StoreError};
use std::sync::Arc;

/// Which message template a classified error uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Access,
}

impl Operation {
    /// Message for a failure of this operation on `key`.
    pub fn message(self, key: &str) -> String {
        match self {
            Operation::Read => format!("Error reading '{}'", key),
            Operation::Write => format!("Error writing '{}'", key),
            Operation::Access => format!("Error accessing '{}'", key),
        }
    }
}

/// Map a provider error on `key` to a [`TransferError`].
///
/// Only 403 and 404 get dedicated outcomes. Everything else, including
/// throttling and 5xx, and errors without a status at all, is a
/// `TransferFailed` and therefore retryable. Provider error codes are too
/// many to enumerate, so unmapped codes are never treated as success.
pub fn classify(err: &ProviderError, key: &str, op: Operation) -> TransferError {
    match err.status {
        Some(403) => TransferError::PermissionDenied {
            key: key.to_string(),
            message: op.message(key),
            source: err.clone(),
        },
        Some(404) => TransferError::NotFound {
            key: key.to_string(),
            source: Some(err.clone()),
        },
        _ => TransferError::TransferFailed {
            key: key.to_string(),
            message: op.message(key),
            source: Some(Arc::new(err.clone())),
        },
    }
}

/// Like [`classify`], for any store error. Local I/O failures are always `TransferFailed`.
pub fn classify_store(err: StoreError, key: &str, op: Operation) -> TransferError {
    match err {
        StoreError::Provider(p) => classify(&p, key, op),
        StoreError::Io(io) => TransferError::failed_with(key, op.message(key), io),
    }
}
