//! # inproc-core
//!
//! Core abstractions shared by real and in-process networking.
//!
//! Networked code is written against the provider traits defined here and
//! handed a concrete provider by whoever runs it:
//!
//! - [`TokioNetworkProvider`]: real OS sockets through Tokio
//! - `VirtualNetwork` (in `inproc-net`): an in-memory network where
//!   connections are instantaneous and traffic never leaves the process
//!
//! ## Provider Traits
//!
//! - [`NetworkProvider`]: connect to a remote address or bind a listener
//! - [`TcpListenerTrait`]: accept incoming connections
//!
//! ## Addressing and Errors
//!
//! - [`SocketAddress`]: the argument accepted by bind and connect
//! - [`SocketError`]: socket state violations, listener shutdown and
//!   forced cancellation, convertible to and from [`std::io::Error`]

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod address;
mod error;
mod network;

// Addressing exports
pub use address::{DEFAULT_BUFFER_SIZE, DEFAULT_LOCAL_ADDRESS, SocketAddress, UNBOUND_ADDRESS};

// Error exports
pub use error::{SocketError, SocketResult};

// Provider trait exports
pub use network::{NetworkProvider, TcpListenerTrait, TokioNetworkProvider, TokioTcpListener};
