//! Progress reporting for transfers (bytes done, rate, ETA).
//!
//! [`ProgressMeter`] is a listener that accumulates de-duplicated bytes and
//! periodically logs them; consumers read a [`ProgressStats`] snapshot.

use super::ProgressListener;
use std::time::{Duration, Instant};

/// Snapshot of progress for one resource (CLI-friendly).
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Distinct bytes transferred so far.
    pub bytes_done: u64,
    /// Resource size in bytes, when known up front.
    pub total_bytes: Option<u64>,
    /// Elapsed time since the transfer started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Transfer rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if the size is unknown or rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.total_bytes?;
        let remaining = total.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0], if the size is known.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total_bytes?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.bytes_done as f64 / total as f64).min(1.0))
    }
}

/// Listener that counts bytes and logs progress at most once per `interval`.
#[derive(Debug)]
pub struct ProgressMeter {
    label: String,
    total_bytes: Option<u64>,
    bytes_done: u64,
    started: Instant,
    last_report: Instant,
    interval: Duration,
}

impl ProgressMeter {
    pub fn new(label: impl Into<String>, total_bytes: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            label: label.into(),
            total_bytes,
            bytes_done: 0,
            started: now,
            last_report: now,
            interval: Duration::from_secs(1),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Count `bytes` and log if the reporting interval has passed.
    pub fn record(&mut self, bytes: &[u8]) {
        self.bytes_done += bytes.len() as u64;
        if self.last_report.elapsed() >= self.interval {
            self.last_report = Instant::now();
            let stats = self.stats();
            tracing::info!(
                resource = %self.label,
                bytes_done = stats.bytes_done,
                total_bytes = ?stats.total_bytes,
                rate = stats.bytes_per_sec() as u64,
                "transfer progress"
            );
        }
    }

    pub fn stats(&self) -> ProgressStats {
        ProgressStats {
            bytes_done: self.bytes_done,
            total_bytes: self.total_bytes,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

impl ProgressListener for ProgressMeter {
    fn transferred(&mut self, chunk: &[u8]) {
        self.record(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_and_eta() {
        let s = ProgressStats {
            bytes_done: 50,
            total_bytes: Some(100),
            elapsed_secs: 5.0,
        };
        assert!((s.bytes_per_sec() - 10.0).abs() < 1e-9);
        assert!((s.eta_secs().unwrap() - 5.0).abs() < 1e-9);
        assert!((s.fraction().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_size_has_no_eta() {
        let s = ProgressStats {
            bytes_done: 10,
            total_bytes: None,
            elapsed_secs: 1.0,
        };
        assert!(s.eta_secs().is_none());
        assert!(s.fraction().is_none());
    }

    #[test]
    fn meter_counts_bytes() {
        let mut m = ProgressMeter::new("a.jar", Some(8)).with_interval(Duration::ZERO);
        m.record(b"abc");
        m.record(b"defgh");
        let s = m.stats();
        assert_eq!(s.bytes_done, 8);
        assert_eq!(s.eta_secs(), Some(0.0));
    }
}
