//! The virtual network: configuration plus client and server socket factories.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use inproc_core::{NetworkProvider, SocketAddress, SocketResult};
use tracing::instrument;

use crate::config::NetworkConfiguration;
use crate::listener::VirtualListener;
use crate::socket::VirtualSocket;

/// State shared by the network handle and every socket it created.
#[derive(Debug)]
pub(crate) struct NetworkShared {
    pub(crate) config: NetworkConfiguration,
    pub(crate) listener: VirtualListener,
}

/// An in-process network with a single listener.
///
/// Connections made through a `VirtualNetwork` never touch the OS: a
/// connect immediately creates a pair of cross-wired pipes, hands one side
/// to the client and queues the other on the listener for `accept`.
///
/// Construct one per test or benchmark run and pass it (or clones of it)
/// wherever sockets are needed. It also implements [`NetworkProvider`], so
/// code generic over providers can run against it unchanged.
///
/// # Examples
///
/// ```rust
/// use inproc_net::VirtualNetwork;
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # tokio_test_block_on(async {
/// let network = VirtualNetwork::new();
/// let listener = network.listening_socket();
///
/// let mut client = network
///     .connected_socket_to_host("localhost", 8080)
///     .expect("connect");
/// let mut server = listener.accept().await.expect("accept");
///
/// client.write_all(b"ping").await.expect("write");
/// let mut buf = [0u8; 4];
/// server.read_exact(&mut buf).await.expect("read");
/// assert_eq!(&buf, b"ping");
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().expect("runtime").block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct VirtualNetwork {
    shared: Arc<NetworkShared>,
}

impl VirtualNetwork {
    /// Create a network with the default configuration.
    pub fn new() -> Self {
        Self::with_config(NetworkConfiguration::default())
    }

    /// Create a network whose pipes hold `buffer_size` bytes each.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self::with_config(NetworkConfiguration::default().with_buffer_size(buffer_size))
    }

    /// Create a network with the given configuration.
    pub fn with_config(config: NetworkConfiguration) -> Self {
        let config = config.normalized();
        tracing::debug!(buffer_size = config.buffer_size, "virtual network created");
        Self {
            shared: Arc::new(NetworkShared {
                config,
                listener: VirtualListener::new(),
            }),
        }
    }

    /// The configuration every pipe of this network is created with.
    pub fn config(&self) -> &NetworkConfiguration {
        &self.shared.config
    }

    /// Create an unbound, unconnected client socket.
    pub fn client_socket(&self) -> VirtualSocket {
        VirtualSocket::unbound(Arc::downgrade(&self.shared))
    }

    /// Create a client socket connected to `remote`.
    pub fn connected_socket(
        &self,
        remote: impl Into<SocketAddress>,
    ) -> SocketResult<VirtualSocket> {
        let mut socket = self.client_socket();
        socket.connect(remote)?;
        Ok(socket)
    }

    /// Create a client socket bound to `local`, then connected to `remote`.
    pub fn bound_connected_socket(
        &self,
        remote: impl Into<SocketAddress>,
        local: impl Into<SocketAddress>,
    ) -> SocketResult<VirtualSocket> {
        let mut socket = self.client_socket();
        socket.bind(local)?;
        socket.connect(remote)?;
        Ok(socket)
    }

    /// Create a client socket connected to `host:port`.
    ///
    /// The host name is not looked up: IP literals and `localhost` become IP
    /// addresses, anything else is kept as a [`SocketAddress::Host`].
    pub fn connected_socket_to_host(&self, host: &str, port: u16) -> SocketResult<VirtualSocket> {
        self.connected_socket(SocketAddress::from_host(host, port))
    }

    /// Create a client socket bound to `local_host:local_port`, then
    /// connected to `host:port`.
    pub fn bound_connected_socket_to_host(
        &self,
        host: &str,
        port: u16,
        local_host: IpAddr,
        local_port: u16,
    ) -> SocketResult<VirtualSocket> {
        self.bound_connected_socket(
            SocketAddress::from_host(host, port),
            (local_host, local_port),
        )
    }

    /// The network's listener. Always the same one.
    pub fn listening_socket(&self) -> VirtualListener {
        self.shared.listener.clone()
    }

    /// The network's listener; `port` is ignored.
    pub fn listening_socket_on(&self, port: u16) -> VirtualListener {
        tracing::trace!(port, "port ignored, returning the single listener");
        self.listening_socket()
    }
}

impl Default for VirtualNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkProvider for VirtualNetwork {
    type TcpStream = VirtualSocket;
    type TcpListener = VirtualListener;

    #[instrument(skip(self))]
    async fn bind(&self, addr: SocketAddr) -> io::Result<Self::TcpListener> {
        Ok(self.listening_socket_on(addr.port()))
    }

    #[instrument(skip(self))]
    async fn connect(&self, addr: SocketAddr) -> io::Result<Self::TcpStream> {
        Ok(self.connected_socket(addr)?)
    }

    #[instrument(skip(self))]
    async fn connect_from(
        &self,
        addr: SocketAddr,
        local: SocketAddr,
    ) -> io::Result<Self::TcpStream> {
        Ok(self.bound_connected_socket(addr, local)?)
    }
}
