//! Transfer progress: retry-aware tracking, stream wrappers and stats.

mod stats;
mod stream;
mod tracker;

pub use stats::{ProgressMeter, ProgressStats};
pub use stream::{ProgressReader, ProgressWriter};
pub use tracker::{ProgressListener, RetryableProgress, TransferAttemptState, TransferProgress};
