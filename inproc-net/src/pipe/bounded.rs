use std::collections::VecDeque;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use thiserror::Error;
use tokio::io::ReadBuf;

/// Closed-state failures reported by a [`BoundedPipe`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeError {
    /// The end being used has already been closed.
    #[error("closed")]
    Closed,

    /// Bytes were written after the reading end went away.
    #[error("source is closed")]
    SourceClosed,
}

impl From<PipeError> for io::Error {
    fn from(err: PipeError) -> Self {
        let kind = match err {
            PipeError::Closed => io::ErrorKind::NotConnected,
            PipeError::SourceClosed => io::ErrorKind::BrokenPipe,
        };
        io::Error::new(kind, err)
    }
}

/// A fixed-capacity byte buffer with a sink (write end) and a source (read end).
///
/// - Writes park while the buffer is full and resume as the source drains it.
/// - Reads park while the buffer is empty. Once the sink is closed and the
///   buffer drained, reads return end-of-stream.
/// - Closing the source drops buffered bytes; further writes fail with
///   [`PipeError::SourceClosed`].
/// - Using an end after closing it fails with [`PipeError::Closed`].
///
/// Both ends are driven through `&self`, so one pipe can be shared by a
/// writer task and a reader task on different threads.
#[derive(Debug)]
pub struct BoundedPipe {
    capacity: usize,
    state: Mutex<PipeState>,
}

#[derive(Debug, Default)]
struct PipeState {
    buffer: VecDeque<u8>,
    sink_closed: bool,
    source_closed: bool,
    /// Tasks parked in `poll_read` waiting for bytes or end-of-stream.
    read_wakers: Vec<Waker>,
    /// Tasks parked in `poll_write` waiting for room.
    write_wakers: Vec<Waker>,
}

fn register(wakers: &mut Vec<Waker>, waker: &Waker) {
    if !wakers.iter().any(|w| w.will_wake(waker)) {
        wakers.push(waker.clone());
    }
}

fn wake_all(wakers: Vec<Waker>) {
    for waker in wakers {
        waker.wake();
    }
}

impl BoundedPipe {
    /// Create a pipe holding at most `capacity` unread bytes.
    ///
    /// A capacity of zero is raised to one so a writer can always make progress.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(PipeState::default()),
        }
    }

    /// Maximum number of unread bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes written but not read yet.
    pub fn buffered(&self) -> usize {
        self.lock().buffer.len()
    }

    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write as many bytes of `buf` as fit, parking while the buffer is full.
    pub fn poll_write(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, PipeError>> {
        let mut state = self.lock();
        if state.sink_closed {
            return Poll::Ready(Err(PipeError::Closed));
        }
        if state.source_closed {
            return Poll::Ready(Err(PipeError::SourceClosed));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let room = self.capacity - state.buffer.len();
        if room == 0 {
            register(&mut state.write_wakers, cx.waker());
            return Poll::Pending;
        }

        let n = room.min(buf.len());
        state.buffer.extend(&buf[..n]);
        let readers = std::mem::take(&mut state.read_wakers);
        drop(state);

        wake_all(readers);
        Poll::Ready(Ok(n))
    }

    /// Fail if the sink is closed.
    ///
    /// Buffered bytes are visible to the source as soon as they are written,
    /// so there is nothing to push.
    pub fn flush(&self) -> Result<(), PipeError> {
        if self.lock().sink_closed {
            return Err(PipeError::Closed);
        }
        Ok(())
    }

    /// Close the sink. The source reads remaining bytes, then end-of-stream.
    ///
    /// Closing an already closed sink is a no-op.
    pub fn close_sink(&self) -> Result<(), PipeError> {
        let mut state = self.lock();
        if state.sink_closed {
            return Ok(());
        }
        state.sink_closed = true;
        let readers = std::mem::take(&mut state.read_wakers);
        let writers = std::mem::take(&mut state.write_wakers);
        drop(state);

        wake_all(readers);
        wake_all(writers);
        Ok(())
    }

    /// Read available bytes into `buf`, parking while the buffer is empty.
    ///
    /// Leaves `buf` untouched at end-of-stream.
    pub fn poll_read(
        &self,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<Result<(), PipeError>> {
        let mut state = self.lock();
        if state.source_closed {
            return Poll::Ready(Err(PipeError::Closed));
        }
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        if state.buffer.is_empty() {
            if state.sink_closed {
                return Poll::Ready(Ok(()));
            }
            register(&mut state.read_wakers, cx.waker());
            return Poll::Pending;
        }

        let n = buf.remaining().min(state.buffer.len());
        let (front, back) = state.buffer.as_slices();
        let from_front = n.min(front.len());
        buf.put_slice(&front[..from_front]);
        buf.put_slice(&back[..n - from_front]);
        state.buffer.drain(..n);
        let writers = std::mem::take(&mut state.write_wakers);
        drop(state);

        wake_all(writers);
        Poll::Ready(Ok(()))
    }

    /// Close the source, discarding unread bytes.
    ///
    /// Parked writers wake and fail. Closing an already closed source is a no-op.
    pub fn close_source(&self) -> Result<(), PipeError> {
        let mut state = self.lock();
        if state.source_closed {
            return Ok(());
        }
        state.source_closed = true;
        state.buffer.clear();
        let readers = std::mem::take(&mut state.read_wakers);
        let writers = std::mem::take(&mut state.write_wakers);
        drop(state);

        wake_all(readers);
        wake_all(writers);
        Ok(())
    }
}
