//! # inproc-net
//!
//! An in-process virtual network that behaves like OS sockets.
//!
//! Bind, connect, accept, read, write and close all happen in memory:
//! no ports are opened and no traffic reaches the kernel. Connections are
//! instantaneous, which makes networked client/server code cheap and
//! deterministic to exercise in tests and benchmarks, while backpressure,
//! connection pairing and shutdown still follow socket semantics.
//!
//! ## Core Components
//!
//! - [`VirtualNetwork`]: owns the configuration and the single listener,
//!   and creates client sockets
//! - [`VirtualSocket`]: one endpoint of a connection, with
//!   [`SocketReader`] / [`SocketWriter`] stream views
//! - [`VirtualListener`]: FIFO accept queue of connected peers
//! - [`pipe`]: bounded, cancelable byte pipes carrying each direction
//!
//! ## Connection Lifecycle
//!
//! ```text
//!  client                          network                       server
//!  ──────                          ───────                       ──────
//!  connect(addr) ──► bind implicitly if unbound
//!                    build pipe pair ──► queue peer ──────────► accept()
//!  write ─────────────────► [ pipe: client -> server ] ─────────► read
//!  read  ◄───────────────── [ pipe: server -> client ] ◄───────── write
//!  close() ──► cancel both pipes ──► parked readers/writers fail with Canceled
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use inproc_net::VirtualNetwork;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! let network = VirtualNetwork::new();
//! let listener = network.listening_socket();
//! let mut client = network.connected_socket_to_host("localhost", 80)?;
//! let mut server = listener.accept().await?;
//! client.write_all(b"hello").await?;
//! ```
//!
//! Code generic over [`NetworkProvider`] can be handed a `VirtualNetwork`
//! in tests and a [`TokioNetworkProvider`] in production.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// Re-export core types for convenience
pub use inproc_core::{
    DEFAULT_BUFFER_SIZE, DEFAULT_LOCAL_ADDRESS, NetworkProvider, SocketAddress, SocketError,
    SocketResult, TcpListenerTrait, TokioNetworkProvider, TokioTcpListener, UNBOUND_ADDRESS,
};

/// Virtual network configuration.
pub mod config;

/// Bounded and cancelable byte pipes.
pub mod pipe;

mod listener;
mod network;
mod socket;

pub use config::NetworkConfiguration;
pub use listener::VirtualListener;
pub use network::VirtualNetwork;
pub use socket::{SocketReader, SocketWriter, VirtualSocket};
