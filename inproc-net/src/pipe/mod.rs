//! Byte pipes backing each direction of a virtual connection.
//!
//! A connection is two [`CancelablePipe`]s, one per direction. Each wraps a
//! [`BoundedPipe`], the fixed-capacity buffer that gives writers
//! backpressure and readers something to wait on.

/// Fixed-capacity byte buffer with independent read and write ends
pub mod bounded;

/// Bounded pipe with forced cancellation
pub mod cancelable;

pub use bounded::{BoundedPipe, PipeError};
pub use cancelable::CancelablePipe;
