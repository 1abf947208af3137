//! Retry-aware progress tracking.
//!
//! A retried transfer replays bytes that earlier, failed attempts already
//! reported. [`RetryableProgress`] remembers how far the logical transfer
//! got and forwards only bytes past that point, so the downstream listener
//! sees each byte of the resource exactly once.

/// Sink for the bytes of a transfer as they move.
pub trait TransferProgress {
    /// Called once at the start of every physical attempt, before any bytes move.
    fn start_attempt(&mut self);

    /// Called once per chunk, in order.
    fn notify(&mut self, chunk: &[u8]);
}

impl<T: TransferProgress + ?Sized> TransferProgress for &mut T {
    fn start_attempt(&mut self) {
        (**self).start_attempt();
    }

    fn notify(&mut self, chunk: &[u8]) {
        (**self).notify(chunk);
    }
}

/// Downstream consumer of de-duplicated progress.
pub trait ProgressListener {
    fn transferred(&mut self, bytes: &[u8]);
}

impl<F: FnMut(&[u8])> ProgressListener for F {
    fn transferred(&mut self, bytes: &[u8]) {
        self(bytes)
    }
}

/// Byte counters for one logical transfer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferAttemptState {
    /// Distinct bytes reported downstream so far, across all attempts.
    pub total_bytes_seen: u64,
    /// Bytes observed in the current attempt, replayed or not.
    pub bytes_seen_this_attempt: u64,
}

/// Progress tracker that hides replayed bytes from its listener.
///
/// Owned by exactly one logical transfer; never share it between transfers.
#[derive(Debug)]
pub struct RetryableProgress<L> {
    listener: L,
    state: TransferAttemptState,
}

impl<L: ProgressListener> RetryableProgress<L> {
    pub fn new(listener: L) -> Self {
        Self {
            listener,
            state: TransferAttemptState::default(),
        }
    }

    pub fn state(&self) -> TransferAttemptState {
        self.state
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }
}

impl<L: ProgressListener> TransferProgress for RetryableProgress<L> {
    fn start_attempt(&mut self) {
        self.state.bytes_seen_this_attempt = 0;
    }

    fn notify(&mut self, chunk: &[u8]) {
        let len = chunk.len() as u64;
        let seen_after = self.state.bytes_seen_this_attempt + len;
        if seen_after <= self.state.total_bytes_seen {
            // Entire chunk is a replay.
            self.state.bytes_seen_this_attempt = seen_after;
            return;
        }

        // Never more than `len`: total_bytes_seen >= bytes_seen_this_attempt.
        let new_bytes = seen_after - self.state.total_bytes_seen;
        debug_assert!(new_bytes <= len);
        let tail = &chunk[chunk.len() - new_bytes as usize..];
        self.listener.transferred(tail);

        self.state.bytes_seen_this_attempt = seen_after;
        self.state.total_bytes_seen += new_bytes;
    }
}
