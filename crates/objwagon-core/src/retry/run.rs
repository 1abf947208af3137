//! Retry loop: run a transfer until success or the policy says stop.

use super::error::TransferError;
use super::observer::{AttemptEvent, AttemptObserver, AttemptOutcome};
use super::policy::{RetryDecision, RetryPolicy};
use crate::progress::TransferProgress;

/// Runs `op` until it succeeds or the retry policy says to stop.
///
/// Each attempt starts with `progress.start_attempt()` so replayed bytes are
/// not reported twice. On a retryable failure the calling thread sleeps for
/// the fixed backoff, then tries again; non-retryable failures and the last
/// failure are returned as-is. Every attempt is reported to `observer`.
pub fn run_with_retry<P, F>(
    policy: &RetryPolicy,
    progress: &mut P,
    observer: &dyn AttemptObserver,
    mut op: F,
) -> Result<(), TransferError>
where
    P: TransferProgress + ?Sized,
    F: FnMut(&mut P) -> Result<(), TransferError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        progress.start_attempt();
        match op(progress) {
            Ok(()) => {
                observer.on_attempt(&AttemptEvent {
                    attempt,
                    max_attempts,
                    outcome: AttemptOutcome::Succeeded,
                });
                return Ok(());
            }
            Err(e) => {
                let decision = policy.decide(attempt, &e);
                let retry_in = match decision {
                    RetryDecision::RetryAfter(d) => Some(d),
                    RetryDecision::NoRetry => None,
                };
                observer.on_attempt(&AttemptEvent {
                    attempt,
                    max_attempts,
                    outcome: AttemptOutcome::Failed {
                        error: &e,
                        retryable: (policy.retryable)(&e),
                        retry_in,
                    },
                });
                match decision {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        if !d.is_zero() {
                            std::thread::sleep(d);
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}
