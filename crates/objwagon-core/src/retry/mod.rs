//! Retry policy and error classification for transfers.
//!
//! Provider errors are classified into a small taxonomy
//! ([`TransferError`]); the retry loop re-runs only generic transfer
//! failures, with a fixed backoff and a bounded number of attempts, so that
//! put/get callers share one consistent policy per backend.

mod classify;
mod error;
mod observer;
mod policy;
mod run;

pub use classify::{classify, classify_store, Operation};
pub use error::{Cause, TransferError, TransferErrorKind};
pub use observer::{AttemptEvent, AttemptObserver, AttemptOutcome, TracingObserver};
pub use policy::{is_transfer_failure, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
