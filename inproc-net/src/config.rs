//! # Virtual Network Configuration
//!
//! | Setting | Field | Default | Effect |
//! |---------|-------|---------|--------|
//! | Buffer size | `buffer_size` | 1 MiB | Capacity of each direction of every connection; writers park when it is full |
//! | Implicit local address | `implicit_local_address` | `127.0.0.1:1` | Local address given to an unbound client when it connects |
//!
//! Every client that connects without binding first gets the same implicit
//! local address. Connections are paired by accept order, so this does not
//! affect correctness, but local addresses do not tell concurrent
//! connections apart.
//!
//! ## Examples
//!
//! ```rust
//! use inproc_net::NetworkConfiguration;
//!
//! let config = NetworkConfiguration::default().with_buffer_size(64 * 1024);
//! assert_eq!(config.buffer_size, 65_536);
//! ```

use std::net::SocketAddr;

use inproc_core::{DEFAULT_BUFFER_SIZE, DEFAULT_LOCAL_ADDRESS};
use serde::{Deserialize, Serialize};

/// Settings shared by every connection a virtual network creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfiguration {
    /// Capacity in bytes of each pipe (one per direction of a connection)
    pub buffer_size: usize,
    /// Local address bound implicitly when an unbound client connects
    pub implicit_local_address: SocketAddr,
}

impl Default for NetworkConfiguration {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            implicit_local_address: DEFAULT_LOCAL_ADDRESS,
        }
    }
}

impl NetworkConfiguration {
    /// Set the capacity of each pipe.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the local address used for implicit binds.
    pub fn with_implicit_local_address(mut self, addr: SocketAddr) -> Self {
        self.implicit_local_address = addr;
        self
    }

    /// Raise a zero buffer size to one byte.
    ///
    /// A zero-capacity pipe could never accept a byte, so every writer would
    /// park forever.
    pub(crate) fn normalized(mut self) -> Self {
        if self.buffer_size == 0 {
            tracing::warn!("buffer_size of 0 would block every write, using 1");
            self.buffer_size = 1;
        }
        self
    }
}
