//! The listening side of a virtual network.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use inproc_core::{SocketAddress, SocketError, SocketResult, TcpListenerTrait, UNBOUND_ADDRESS};
use tokio::sync::mpsc;

use crate::socket::VirtualSocket;

/// FIFO of connected peer sockets waiting for `accept`.
///
/// Closing drops the only sender. Sockets already queued stay acceptable;
/// once they are consumed every receive, current or future, sees the
/// channel closed, so no accept call can miss the shutdown.
#[derive(Debug)]
pub(crate) struct AcceptQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<VirtualSocket>>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<VirtualSocket>>,
    closed: AtomicBool,
    pending: AtomicUsize,
}

impl AcceptQueue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            closed: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
        }
    }

    fn offer(&self, socket: VirtualSocket) -> SocketResult<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(SocketError::Closed)?;
        // Count before sending so `accept` never decrements below zero.
        self.pending.fetch_add(1, Ordering::AcqRel);
        if sender.send(socket).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(SocketError::Closed);
        }
        Ok(())
    }

    async fn accept(&self) -> SocketResult<VirtualSocket> {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(socket) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Ok(socket)
            }
            None => Err(SocketError::Closed),
        }
    }

    fn close(&self) -> bool {
        self.closed.store(true, Ordering::Release);
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}

/// The single listening socket of a [`VirtualNetwork`](crate::VirtualNetwork).
///
/// Every handle obtained from one network refers to the same listener,
/// whatever address was asked for. Handles are cheap to clone; closing
/// through any of them closes the listener for all.
#[derive(Debug, Clone)]
pub struct VirtualListener {
    queue: Arc<AcceptQueue>,
}

impl VirtualListener {
    pub(crate) fn new() -> Self {
        Self {
            queue: Arc::new(AcceptQueue::new()),
        }
    }

    pub(crate) fn offer(&self, socket: VirtualSocket) -> SocketResult<()> {
        let remote = socket.remote_socket_address().cloned();
        self.queue.offer(socket)?;
        tracing::debug!(?remote, pending = self.pending(), "peer queued for accept");
        Ok(())
    }

    /// Wait for the next connected peer.
    ///
    /// Peers are returned in the order their clients connected. Fails with
    /// [`SocketError::Closed`] once the listener is closed and every peer
    /// queued before the close has been accepted.
    pub async fn accept(&self) -> SocketResult<VirtualSocket> {
        let socket = self.queue.accept().await?;
        tracing::debug!(
            local = ?socket.local_socket_address(),
            remote = ?socket.remote_socket_address(),
            "accepted"
        );
        Ok(socket)
    }

    /// Stop accepting connections.
    ///
    /// Queued peers are not discarded. New connects fail with
    /// [`SocketError::Closed`]. Idempotent.
    pub fn close(&self) {
        if self.queue.close() {
            tracing::debug!(pending = self.pending(), "listener closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.queue.closed.load(Ordering::Acquire)
    }

    /// Number of connected peers not accepted yet.
    pub fn pending(&self) -> usize {
        self.queue.pending.load(Ordering::Acquire)
    }

    /// Whether `self` and `other` are handles to the same listener.
    pub fn same_listener(&self, other: &VirtualListener) -> bool {
        Arc::ptr_eq(&self.queue, &other.queue)
    }
}

#[async_trait]
impl TcpListenerTrait for VirtualListener {
    type TcpStream = VirtualSocket;

    async fn accept(&self) -> io::Result<(Self::TcpStream, SocketAddr)> {
        let socket = VirtualListener::accept(self).await?;
        let remote = match socket.remote_socket_address() {
            Some(SocketAddress::Inet(addr)) => *addr,
            // A client bound to a host name has no IP to report.
            Some(SocketAddress::Host { port, .. }) => SocketAddr::new(UNBOUND_ADDRESS, *port),
            _ => return Err(SocketError::NotConnected.into()),
        };
        Ok((socket, remote))
    }

    /// The listener is not bound to any address, so this reports the
    /// unspecified address. Connecting to any address reaches it.
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)))
    }
}
