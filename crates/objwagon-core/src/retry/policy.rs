use super::error::{TransferError, TransferErrorKind};
use crate::config::RetryConfig;
use crate::store::BackendKind;
use std::time::Duration;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Bounded-attempt, fixed-backoff retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
    /// Which failures are worth another attempt.
    pub retryable: fn(&TransferError) -> bool,
}

/// Default predicate: only generic transfer failures are retried.
pub fn is_transfer_failure(err: &TransferError) -> bool {
    err.kind() == TransferErrorKind::TransferFailed
}

impl RetryPolicy {
    /// S3 profile: 3 attempts, 5 seconds apart.
    pub fn s3() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
            retryable: is_transfer_failure,
        }
    }

    /// GCS profile: 10 attempts, 2 seconds apart.
    pub fn gcs() -> Self {
        Self {
            max_attempts: 10,
            backoff: Duration::from_secs(2),
            retryable: is_transfer_failure,
        }
    }

    /// Profile for a backend. The local filesystem backend uses the GCS profile.
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::S3 => Self::s3(),
            BackendKind::Gcs | BackendKind::Fs => Self::gcs(),
        }
    }

    /// Apply `[retry]` overrides from the config file, if any.
    pub fn with_config(mut self, cfg: Option<&RetryConfig>) -> Self {
        if let Some(cfg) = cfg {
            self.max_attempts = cfg.max_attempts.max(1);
            if let Ok(backoff) = Duration::try_from_secs_f64(cfg.backoff_secs) {
                self.backoff = backoff;
            }
        }
        self
    }

    /// Decide what to do after `attempt` (1-based) failed with `err`.
    pub fn decide(&self, attempt: u32, err: &TransferError) -> RetryDecision {
        if attempt >= self.max_attempts || !(self.retryable)(err) {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff)
    }
}
