// Listener module
// Builds the TCP listener with explicit socket options

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use crate::config::Config;

/// Socket options applied before `bind`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerOptions {
    /// `SO_REUSEADDR`: rebind immediately to a port left in `TIME_WAIT`
    pub reuse_address: bool,
    /// Pending connection queue length passed to `listen`
    pub backlog: i32,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            reuse_address: true,
            backlog: 128,
        }
    }
}

impl From<&Config> for ListenerOptions {
    fn from(config: &Config) -> Self {
        Self {
            reuse_address: config.server.reuse_address,
            ..Self::default()
        }
    }
}

/// Create a `TcpListener` bound to `addr` with the given options.
///
/// Must be called from within a Tokio runtime.
///
/// # Returns
///
/// * `Ok(TcpListener)` - Successfully created and bound listener
/// * `Err(std::io::Error)` - Failed to create or bind socket
pub fn create_listener(
    addr: std::net::SocketAddr,
    options: ListenerOptions,
) -> std::io::Result<TcpListener> {
    // Create socket with appropriate domain (IPv4 or IPv6)
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    if options.reuse_address {
        socket.set_reuse_address(true)?;
    }

    // Set non-blocking mode for async compatibility
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;
    socket.listen(options.backlog)?;

    // Convert socket2::Socket to std::net::TcpListener, then to tokio::net::TcpListener
    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
