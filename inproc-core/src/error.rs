//! Error types for socket operations.

use std::io;
use thiserror::Error;

/// Errors raised by socket, listener and stream operations.
///
/// Stream traits speak [`io::Error`], so every variant converts into one
/// with a matching [`io::ErrorKind`] and the `SocketError` kept as payload.
/// Use [`SocketError::from_io`] to get it back, for example to tell a
/// forced cancellation apart from a peer that went away.
#[derive(Error, Debug)]
pub enum SocketError {
    /// The socket already has a local address.
    #[error("already bound")]
    AlreadyBound,

    /// The socket already has a remote address.
    #[error("already connected")]
    AlreadyConnected,

    /// The address cannot be expressed as host and port.
    #[error("unexpected address type")]
    InvalidAddressType,

    /// Stream access before the socket was connected.
    #[error("not connected")]
    NotConnected,

    /// The listener (or the socket) has been shut down.
    #[error("closed")]
    Closed,

    /// I/O aborted because the connection was force-closed.
    #[error("canceled")]
    Canceled,

    /// Failure reported by a real OS socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SocketError {
    /// The [`io::ErrorKind`] this error maps to.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::AlreadyBound => io::ErrorKind::AddrInUse,
            Self::AlreadyConnected => io::ErrorKind::AlreadyExists,
            Self::InvalidAddressType => io::ErrorKind::InvalidInput,
            Self::NotConnected => io::ErrorKind::NotConnected,
            Self::Closed => io::ErrorKind::ConnectionRefused,
            Self::Canceled => io::ErrorKind::ConnectionAborted,
            Self::Io(err) => err.kind(),
        }
    }

    /// Recover the `SocketError` carried inside an [`io::Error`].
    pub fn from_io(err: &io::Error) -> Option<&SocketError> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<SocketError>())
    }

    /// Whether `err` reports a forced cancellation.
    pub fn is_canceled(err: &io::Error) -> bool {
        matches!(Self::from_io(err), Some(SocketError::Canceled))
    }
}

impl From<SocketError> for io::Error {
    fn from(err: SocketError) -> Self {
        match err {
            SocketError::Io(inner) => inner,
            other => io::Error::new(other.kind(), other),
        }
    }
}

/// Result type for socket operations.
pub type SocketResult<T> = Result<T, SocketError>;
