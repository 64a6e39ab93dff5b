//! Network provider abstraction for real and in-process networking.
//!
//! Code that opens connections or listens for them takes a
//! [`NetworkProvider`] instead of calling Tokio directly, so the same code
//! runs over real sockets or over an in-process network. The caller picks
//! the provider explicitly; there is no process-wide default.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::instrument;

use crate::{SocketAddress, SocketError};

/// Provider trait for creating client connections and listeners.
///
/// Providers are cheap to clone and shareable across tasks and threads.
#[async_trait]
pub trait NetworkProvider: Clone + Send + Sync + 'static {
    /// The TCP stream type for this provider.
    type TcpStream: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// The TCP listener type for this provider.
    type TcpListener: TcpListenerTrait<TcpStream = Self::TcpStream> + 'static;

    /// Create a listener bound to the given address.
    async fn bind(&self, addr: SocketAddr) -> io::Result<Self::TcpListener>;

    /// Connect to a remote address from an automatically chosen local address.
    async fn connect(&self, addr: SocketAddr) -> io::Result<Self::TcpStream>;

    /// Bind to `local`, then connect to `addr`.
    async fn connect_from(
        &self,
        addr: SocketAddr,
        local: SocketAddr,
    ) -> io::Result<Self::TcpStream>;
}

/// Trait for TCP listeners that can accept connections.
#[async_trait]
pub trait TcpListenerTrait: Send + Sync {
    /// The TCP stream type that this listener produces.
    type TcpStream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Accept a single incoming connection and the peer's address.
    async fn accept(&self) -> io::Result<(Self::TcpStream, SocketAddr)>;

    /// Get the local address this listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Real Tokio networking implementation.
#[derive(Debug, Clone)]
pub struct TokioNetworkProvider;

impl TokioNetworkProvider {
    /// Create a new Tokio network provider.
    pub fn new() -> Self {
        Self
    }

    /// Connect to a host+port address, resolving host names through the
    /// system resolver.
    #[instrument(skip(self))]
    pub async fn connect_to(&self, addr: &SocketAddress) -> io::Result<tokio::net::TcpStream> {
        match addr {
            SocketAddress::Inet(inet) => tokio::net::TcpStream::connect(*inet).await,
            SocketAddress::Host { host, port } => {
                tokio::net::TcpStream::connect((host.as_str(), *port)).await
            }
            SocketAddress::Unix(_) => Err(SocketError::InvalidAddressType.into()),
        }
    }
}

impl Default for TokioNetworkProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkProvider for TokioNetworkProvider {
    type TcpStream = tokio::net::TcpStream;
    type TcpListener = TokioTcpListener;

    #[instrument(skip(self))]
    async fn bind(&self, addr: SocketAddr) -> io::Result<Self::TcpListener> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        Ok(TokioTcpListener { inner: listener })
    }

    #[instrument(skip(self))]
    async fn connect(&self, addr: SocketAddr) -> io::Result<Self::TcpStream> {
        tokio::net::TcpStream::connect(addr).await
    }

    #[instrument(skip(self))]
    async fn connect_from(
        &self,
        addr: SocketAddr,
        local: SocketAddr,
    ) -> io::Result<Self::TcpStream> {
        let socket = match local {
            SocketAddr::V4(_) => tokio::net::TcpSocket::new_v4()?,
            SocketAddr::V6(_) => tokio::net::TcpSocket::new_v6()?,
        };
        socket.bind(local)?;
        socket.connect(addr).await
    }
}

/// Wrapper for Tokio TcpListener to implement our trait.
#[derive(Debug)]
pub struct TokioTcpListener {
    inner: tokio::net::TcpListener,
}

#[async_trait]
impl TcpListenerTrait for TokioTcpListener {
    type TcpStream = tokio::net::TcpStream;

    async fn accept(&self) -> io::Result<(Self::TcpStream, SocketAddr)> {
        self.inner.accept().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
