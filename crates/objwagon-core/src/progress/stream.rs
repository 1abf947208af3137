//! `Read`/`Write` decorators that report moved bytes to a [`TransferProgress`].

use super::TransferProgress;
use std::io::{self, Read, Write};

/// Reader that notifies `progress` with every slice it fills.
pub struct ProgressReader<R, P> {
    inner: R,
    progress: P,
}

impl<R: Read, P: TransferProgress> ProgressReader<R, P> {
    pub fn new(inner: R, progress: P) -> Self {
        Self { inner, progress }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read, P: TransferProgress> Read for ProgressReader<R, P> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.progress.notify(&buf[..n]);
        }
        Ok(n)
    }
}

/// Writer that notifies `progress` with every slice the inner writer accepts.
pub struct ProgressWriter<W, P> {
    inner: W,
    progress: P,
}

impl<W: Write, P: TransferProgress> ProgressWriter<W, P> {
    pub fn new(inner: W, progress: P) -> Self {
        Self { inner, progress }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write, P: TransferProgress> Write for ProgressWriter<W, P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if n > 0 {
            self.progress.notify(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
