//! Socket addressing.
//!
//! Bind and connect accept a [`SocketAddress`]. Only host+port addresses
//! can name a TCP-style endpoint; anything else is rejected with
//! [`SocketError::InvalidAddressType`].
//!
//! Host names are kept as given. Nothing in this module performs a name
//! lookup; [`TokioNetworkProvider::connect_to`](crate::TokioNetworkProvider::connect_to)
//! resolves them when connecting over real sockets.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use crate::{SocketError, SocketResult};

/// Address reported for the local side of a socket that is not bound yet.
pub const UNBOUND_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Local address assigned to an unbound client when it connects.
///
/// Every implicit bind gets the same address and port.
pub const DEFAULT_LOCAL_ADDRESS: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1));

/// Default capacity, in bytes, of each direction of a connection.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// An address passed to bind or connect.
///
/// # Examples
///
/// ```
/// use inproc_core::SocketAddress;
/// use std::net::{Ipv4Addr, SocketAddr};
///
/// let addr = SocketAddress::from((Ipv4Addr::LOCALHOST, 8080));
/// let inet: SocketAddr = addr.as_inet().expect("ip and port");
/// assert_eq!(inet.port(), 8080);
///
/// let named = SocketAddress::from_host("backend.internal", 443);
/// assert_eq!(named.as_inet(), None);
/// assert_eq!(named.port(), Some(443));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SocketAddress {
    /// IP address and port.
    Inet(SocketAddr),
    /// Host name and port, not resolved.
    Host {
        /// Host name as given.
        host: String,
        /// Port number.
        port: u16,
    },
    /// Filesystem path of a local (Unix domain) socket.
    Unix(PathBuf),
}

impl SocketAddress {
    /// Build a host+port address without a name lookup.
    ///
    /// IP literals and `localhost` become [`SocketAddress::Inet`]; any other
    /// name is kept as an unresolved [`SocketAddress::Host`].
    pub fn from_host(host: &str, port: u16) -> Self {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Self::Inet(SocketAddr::new(ip, port));
        }
        if host.eq_ignore_ascii_case("localhost") {
            return Self::Inet(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
        }
        Self::Host {
            host: host.to_owned(),
            port,
        }
    }

    /// Whether this address names a host and port.
    pub fn is_host_port(&self) -> bool {
        !matches!(self, Self::Unix(_))
    }

    /// Return `self` if it names a host and port, otherwise
    /// [`SocketError::InvalidAddressType`].
    pub fn into_host_port(self) -> SocketResult<Self> {
        if self.is_host_port() {
            Ok(self)
        } else {
            Err(SocketError::InvalidAddressType)
        }
    }

    /// The IP address and port, if this address has an IP.
    pub fn as_inet(&self) -> Option<SocketAddr> {
        match self {
            Self::Inet(addr) => Some(*addr),
            Self::Host { .. } | Self::Unix(_) => None,
        }
    }

    /// The IP address, if this address has one.
    pub fn ip(&self) -> Option<IpAddr> {
        self.as_inet().map(|addr| addr.ip())
    }

    /// The port, if this is a host+port address.
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Inet(addr) => Some(addr.port()),
            Self::Host { port, .. } => Some(*port),
            Self::Unix(_) => None,
        }
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::Inet(addr)
    }
}

impl From<SocketAddrV4> for SocketAddress {
    fn from(addr: SocketAddrV4) -> Self {
        Self::Inet(SocketAddr::V4(addr))
    }
}

impl From<(IpAddr, u16)> for SocketAddress {
    fn from((ip, port): (IpAddr, u16)) -> Self {
        Self::Inet(SocketAddr::new(ip, port))
    }
}

impl From<(Ipv4Addr, u16)> for SocketAddress {
    fn from((ip, port): (Ipv4Addr, u16)) -> Self {
        Self::Inet(SocketAddr::new(IpAddr::V4(ip), port))
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inet(addr) => write!(f, "{addr}"),
            Self::Host { host, port } => write!(f, "{host}:{port}"),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
