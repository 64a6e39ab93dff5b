//! Virtual sockets: one endpoint of an in-process connection.

use std::io;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use inproc_core::{SocketAddress, SocketError, SocketResult, UNBOUND_ADDRESS};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::network::NetworkShared;
use crate::pipe::CancelablePipe;

/// The two pipes of one side of a connection.
///
/// Built in pairs by [`Endpoint::pair`]: each endpoint's outbound pipe is
/// the other's inbound pipe.
#[derive(Debug)]
pub(crate) struct Endpoint {
    /// Bytes written by this side and read by the peer.
    outbound: CancelablePipe,
    /// Bytes written by the peer and read by this side.
    inbound: CancelablePipe,
}

impl Endpoint {
    pub(crate) fn pair(capacity: usize) -> (Endpoint, Endpoint) {
        let forward = CancelablePipe::new(capacity);
        let backward = CancelablePipe::new(capacity);
        let local = Endpoint {
            outbound: forward.clone(),
            inbound: backward.clone(),
        };
        let remote = Endpoint {
            outbound: backward,
            inbound: forward,
        };
        (local, remote)
    }

    fn cancel(&self) {
        self.inbound.cancel();
        self.outbound.cancel();
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        // Last handle gone: the peer reads what is buffered then EOF, and its
        // writes fail.
        let _ = self.outbound.close_sink();
        let _ = self.inbound.close_source();
    }
}

/// One endpoint of a virtual connection.
///
/// A socket moves through `unbound -> bound -> connected -> closed` and
/// never backwards. Clients come from the factory methods on
/// [`VirtualNetwork`](crate::VirtualNetwork); servers get the peer half of a
/// connection from [`VirtualListener::accept`](crate::VirtualListener::accept).
///
/// Address fields are only written by [`bind`](Self::bind) and
/// [`connect`](Self::connect), which take `&mut self`, so they need no
/// locking. [`close`](Self::close) takes `&self` and may race with I/O on
/// other handles.
///
/// The socket implements [`AsyncRead`] and [`AsyncWrite`] directly, and
/// [`input_stream`](Self::input_stream) / [`output_stream`](Self::output_stream)
/// hand out independent views that can move to other tasks.
#[derive(Debug)]
pub struct VirtualSocket {
    network: Weak<NetworkShared>,
    local: Option<SocketAddress>,
    remote: Option<SocketAddress>,
    endpoint: Option<Arc<Endpoint>>,
    closed: AtomicBool,
}

impl VirtualSocket {
    pub(crate) fn unbound(network: Weak<NetworkShared>) -> Self {
        Self {
            network,
            local: None,
            remote: None,
            endpoint: None,
            closed: AtomicBool::new(false),
        }
    }

    fn accepted(
        network: Weak<NetworkShared>,
        local: SocketAddress,
        remote: SocketAddress,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            network,
            local: Some(local),
            remote: Some(remote),
            endpoint: Some(Arc::new(endpoint)),
            closed: AtomicBool::new(false),
        }
    }

    /// Assign the local address.
    ///
    /// Fails with [`SocketError::AlreadyConnected`] on a connected socket,
    /// [`SocketError::AlreadyBound`] on a bound one, and
    /// [`SocketError::InvalidAddressType`] if `addr` is not host+port.
    pub fn bind(&mut self, addr: impl Into<SocketAddress>) -> SocketResult<()> {
        if self.is_closed() {
            return Err(SocketError::Closed);
        }
        if self.remote.is_some() {
            return Err(SocketError::AlreadyConnected);
        }
        if self.local.is_some() {
            return Err(SocketError::AlreadyBound);
        }
        let local = addr.into().into_host_port()?;
        tracing::debug!(%local, "socket bound");
        self.local = Some(local);
        Ok(())
    }

    /// Connect to `addr`.
    ///
    /// An unbound socket is first bound to the network's implicit local
    /// address. The peer half of the connection is queued on the network's
    /// listener and this returns without waiting for it to be accepted;
    /// writes buffer up to the pipe capacity in the meantime.
    ///
    /// Fails with [`SocketError::AlreadyConnected`] if already connected, and
    /// with [`SocketError::Closed`] if the listener is closed or the network
    /// is gone.
    pub fn connect(&mut self, addr: impl Into<SocketAddress>) -> SocketResult<()> {
        if self.is_closed() {
            return Err(SocketError::Closed);
        }
        if self.remote.is_some() {
            return Err(SocketError::AlreadyConnected);
        }
        let remote = addr.into().into_host_port()?;
        let network = self.network.upgrade().ok_or(SocketError::Closed)?;

        let local = self
            .local
            .clone()
            .unwrap_or_else(|| network.config.implicit_local_address.into());

        let (endpoint, peer_endpoint) = Endpoint::pair(network.config.buffer_size);
        let peer = VirtualSocket::accepted(
            self.network.clone(),
            remote.clone(),
            local.clone(),
            peer_endpoint,
        );
        network.listener.offer(peer)?;

        if self.local.is_none() {
            tracing::debug!(%local, "socket bound implicitly");
        }
        tracing::debug!(%local, %remote, "socket connected");
        self.local = Some(local);
        self.remote = Some(remote);
        self.endpoint = Some(Arc::new(endpoint));
        Ok(())
    }

    /// Connect with a timeout. Virtual connections are immediate, so the
    /// timeout is accepted and ignored.
    pub fn connect_timeout(
        &mut self,
        addr: impl Into<SocketAddress>,
        _timeout: Duration,
    ) -> SocketResult<()> {
        self.connect(addr)
    }

    /// Force-close the connection.
    ///
    /// Cancels both pipes, so any task parked reading or writing on either
    /// side fails with [`SocketError::Canceled`]. Safe to call more than once
    /// and from several tasks.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(local = ?self.local, remote = ?self.remote, "closing socket");
        }
        if let Some(endpoint) = &self.endpoint {
            endpoint.cancel();
        }
    }

    /// Whether [`close`](Self::close) has been called on this socket.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether both local and remote addresses are set.
    pub fn is_connected(&self) -> bool {
        self.local.is_some() && self.remote.is_some()
    }

    /// Whether a local address is set.
    pub fn is_bound(&self) -> bool {
        self.local.is_some()
    }

    /// Local address, if bound. Host names are reported as given.
    pub fn local_socket_address(&self) -> Option<&SocketAddress> {
        self.local.as_ref()
    }

    /// Local IP address, or [`UNBOUND_ADDRESS`] if not bound or bound to an
    /// unresolved host name.
    pub fn local_address(&self) -> IpAddr {
        self.local
            .as_ref()
            .and_then(SocketAddress::ip)
            .unwrap_or(UNBOUND_ADDRESS)
    }

    /// Local port, if bound.
    pub fn local_port(&self) -> Option<u16> {
        self.local.as_ref().and_then(SocketAddress::port)
    }

    /// Remote address, if connected. Host names are reported as given.
    pub fn remote_socket_address(&self) -> Option<&SocketAddress> {
        self.remote.as_ref()
    }

    /// Remote IP address, if connected to one. `None` for host names.
    pub fn remote_address(&self) -> Option<IpAddr> {
        self.remote.as_ref().and_then(SocketAddress::ip)
    }

    /// Remote port, if connected.
    pub fn remote_port(&self) -> Option<u16> {
        self.remote.as_ref().and_then(SocketAddress::port)
    }

    fn endpoint(&self) -> SocketResult<&Arc<Endpoint>> {
        match &self.endpoint {
            Some(endpoint) if self.is_connected() => Ok(endpoint),
            _ => Err(SocketError::NotConnected),
        }
    }

    /// Reading view over the bytes sent by the peer.
    pub fn input_stream(&self) -> SocketResult<SocketReader> {
        Ok(SocketReader {
            endpoint: self.endpoint()?.clone(),
        })
    }

    /// Writing view over the bytes sent to the peer.
    pub fn output_stream(&self) -> SocketResult<SocketWriter> {
        Ok(SocketWriter {
            endpoint: self.endpoint()?.clone(),
        })
    }
}

/// Reading half of a connected [`VirtualSocket`].
///
/// Keeps the connection open while alive, even if the socket is dropped.
#[derive(Debug, Clone)]
pub struct SocketReader {
    endpoint: Arc<Endpoint>,
}

/// Writing half of a connected [`VirtualSocket`].
///
/// Shutting the writer down closes only this direction: the peer reads
/// what was written, then end-of-stream.
#[derive(Debug, Clone)]
pub struct SocketWriter {
    endpoint: Arc<Endpoint>,
}

fn read_from(
    endpoint: &Endpoint,
    cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
) -> Poll<io::Result<()>> {
    let before = buf.filled().len();
    let result = endpoint.inbound.poll_read(cx, buf);
    if let Poll::Ready(Ok(())) = result {
        tracing::trace!(bytes = buf.filled().len() - before, "virtual read");
    }
    result
}

fn write_to(endpoint: &Endpoint, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
    let result = endpoint.outbound.poll_write(cx, buf);
    if let Poll::Ready(Ok(n)) = result {
        tracing::trace!(bytes = n, "virtual write");
    }
    result
}

impl AsyncRead for SocketReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        read_from(&self.endpoint, cx, buf)
    }
}

impl AsyncWrite for SocketWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        write_to(&self.endpoint, cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(self.endpoint.outbound.flush())
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(self.endpoint.outbound.close_sink())
    }
}

impl AsyncRead for VirtualSocket {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let endpoint = self.endpoint()?;
        read_from(endpoint, cx, buf)
    }
}

impl AsyncWrite for VirtualSocket {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let endpoint = self.endpoint()?;
        write_to(endpoint, cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let endpoint = self.endpoint()?;
        Poll::Ready(endpoint.outbound.flush())
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let endpoint = self.endpoint()?;
        tracing::debug!(local = ?self.local, remote = ?self.remote, "shutting down write side");
        Poll::Ready(endpoint.outbound.close_sink())
    }
}
