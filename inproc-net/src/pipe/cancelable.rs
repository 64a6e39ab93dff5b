use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use inproc_core::SocketError;
use tokio::io::ReadBuf;

use super::{BoundedPipe, PipeError};

/// A [`BoundedPipe`] that can be force-closed from either side.
///
/// Clones share the same pipe. Once [`cancel`](Self::cancel) has run,
/// every closed-state failure on either end is reported as
/// [`SocketError::Canceled`] instead of the plain [`PipeError`], so a
/// forced abort can be told apart from an ordinary close.
#[derive(Debug, Clone)]
pub struct CancelablePipe {
    inner: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    pipe: BoundedPipe,
    canceled: AtomicBool,
}

impl CancelablePipe {
    /// Create a pipe holding at most `capacity` unread bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Shared {
                pipe: BoundedPipe::new(capacity),
                canceled: AtomicBool::new(false),
            }),
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::Acquire)
    }

    /// Maximum number of unread bytes.
    pub fn capacity(&self) -> usize {
        self.inner.pipe.capacity()
    }

    /// Number of bytes written but not read yet.
    pub fn buffered(&self) -> usize {
        self.inner.pipe.buffered()
    }

    /// Whether `self` and `other` share the same underlying pipe.
    pub fn same_pipe(&self, other: &CancelablePipe) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Force-close both ends. Parked readers and writers wake and fail with
    /// [`SocketError::Canceled`]. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.canceled.swap(true, Ordering::AcqRel) {
            tracing::debug!(buffered = self.buffered(), "canceling pipe");
        }
        // Both closes are no-ops on an end that is already closed.
        let _ = self.inner.pipe.close_source();
        let _ = self.inner.pipe.close_sink();
    }

    fn failure(&self, err: PipeError) -> io::Error {
        if self.is_canceled() {
            SocketError::Canceled.into()
        } else {
            err.into()
        }
    }

    /// Write end: see [`BoundedPipe::poll_write`].
    pub fn poll_write(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.inner
            .pipe
            .poll_write(cx, buf)
            .map_err(|err| self.failure(err))
    }

    /// Write end: see [`BoundedPipe::flush`].
    pub fn flush(&self) -> io::Result<()> {
        self.inner.pipe.flush().map_err(|err| self.failure(err))
    }

    /// Write end: see [`BoundedPipe::close_sink`].
    pub fn close_sink(&self) -> io::Result<()> {
        self.inner.pipe.close_sink().map_err(|err| self.failure(err))
    }

    /// Read end: see [`BoundedPipe::poll_read`].
    pub fn poll_read(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        self.inner
            .pipe
            .poll_read(cx, buf)
            .map_err(|err| self.failure(err))
    }

    /// Read end: see [`BoundedPipe::close_source`].
    pub fn close_source(&self) -> io::Result<()> {
        self.inner
            .pipe
            .close_source()
            .map_err(|err| self.failure(err))
    }
}
