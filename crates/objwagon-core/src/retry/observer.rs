//! Per-attempt diagnostics hook for the retry loop.

use super::error::TransferError;
use std::time::Duration;

/// What happened in one attempt.
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome<'a> {
    Succeeded,
    Failed {
        error: &'a TransferError,
        /// Whether the policy considers this kind of failure retryable at all.
        retryable: bool,
        /// Delay before the next attempt; `None` when no attempt follows.
        retry_in: Option<Duration>,
    },
}

/// Event reported after every attempt of a logical transfer.
#[derive(Debug, Clone, Copy)]
pub struct AttemptEvent<'a> {
    /// 1-based attempt number.
    pub attempt: u32,
    pub max_attempts: u32,
    pub outcome: AttemptOutcome<'a>,
}

impl AttemptEvent<'_> {
    pub fn will_retry(&self) -> bool {
        matches!(
            self.outcome,
            AttemptOutcome::Failed {
                retry_in: Some(_),
                ..
            }
        )
    }
}

/// Receives attempt events; implementations route them to logs or a UI.
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, event: &AttemptEvent<'_>);
}

/// Default observer: retryable failures at WARN, causes at DEBUG.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AttemptObserver for TracingObserver {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        match event.outcome {
            AttemptOutcome::Succeeded => {
                if event.attempt > 1 {
                    tracing::info!(
                        "Transfer attempt {}/{} succeeded",
                        event.attempt,
                        event.max_attempts
                    );
                }
            }
            AttemptOutcome::Failed {
                error,
                retryable,
                retry_in,
            } => {
                if retryable {
                    match retry_in {
                        Some(d) => tracing::warn!(
                            "Transfer attempt {}/{} failed. Retrying in {} seconds",
                            event.attempt,
                            event.max_attempts,
                            d.as_secs_f64()
                        ),
                        None => tracing::warn!(
                            "Transfer attempt {}/{} failed. Will not retry",
                            event.attempt,
                            event.max_attempts
                        ),
                    }
                }
                tracing::debug!(
                    key = error.key(),
                    cause = ?std::error::Error::source(error).map(|s| s.to_string()),
                    "Transfer attempt {}/{} failed with exception: {}",
                    event.attempt,
                    event.max_attempts,
                    error
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn will_retry_only_with_delay() {
        let err = TransferError::failed("k", "boom");
        let retrying = AttemptEvent {
            attempt: 1,
            max_attempts: 3,
            outcome: AttemptOutcome::Failed {
                error: &err,
                retryable: true,
                retry_in: Some(Duration::from_secs(5)),
            },
        };
        assert!(retrying.will_retry());
        let last = AttemptEvent {
            attempt: 3,
            max_attempts: 3,
            outcome: AttemptOutcome::Failed {
                error: &err,
                retryable: true,
                retry_in: None,
            },
        };
        assert!(!last.will_retry());
        let ok = AttemptEvent {
            attempt: 1,
            max_attempts: 3,
            outcome: AttemptOutcome::Succeeded,
        };
        assert!(!ok.will_retry());
    }
}
