//! IPv4-only connection establishment bound to vetted addresses.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tokio::net::{TcpSocket, TcpStream};

use crate::error::Error;
use crate::validate::SafeResolver;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Network families accepted by [`Dialer::dial`].
///
/// Both are dialed over IPv4 only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// `tcp`, downgraded to IPv4.
    Tcp,
    /// `tcp4`.
    Tcp4,
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(network: &str) -> Result<Self, Self::Err> {
        match network {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            _ => Err(Error::UnsupportedNetwork {
                network: network.to_string(),
            }),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
        })
    }
}

/// Opens TCP connections only to addresses a [`SafeResolver`] has vetted.
#[derive(Debug, Clone)]
pub struct Dialer {
    resolver: SafeResolver,
    connect_timeout: Option<Duration>,
    keepalive: bool,
}

impl Default for Dialer {
    fn default() -> Self {
        Self::new(SafeResolver::default())
    }
}

impl Dialer {
    /// A dialer with a 30 second connect timeout and TCP keepalive on.
    pub fn new(resolver: SafeResolver) -> Self {
        Self {
            resolver,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            keepalive: true,
        }
    }

    /// Set the TCP connect timeout. `None` waits for the OS.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable `SO_KEEPALIVE` on dialed sockets.
    pub fn with_keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// The resolver that vets every destination.
    pub fn resolver(&self) -> &SafeResolver {
        &self.resolver
    }

    /// Connect to `hostport` over `network`.
    ///
    /// Only `tcp` and `tcp4` are accepted; anything else fails before any DNS
    /// lookup. The destination is vetted by the [`SafeResolver`] and the socket
    /// connects to exactly the address it returned.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use dial_jail::Dialer;
    ///
    /// # async fn example() -> Result<(), dial_jail::Error> {
    /// let stream = Dialer::default().dial("tcp", "example.com:80").await?;
    /// println!("connected to {:?}", stream.peer_addr());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedNetwork`] for any network other than `tcp`/`tcp4`
    /// - every error of [`SafeResolver::resolve_safe_addr`]
    /// - [`Error::Connect`] if the socket fails, including for IPv6 destinations
    /// - [`Error::ConnectTimeout`] if the connect timeout elapses
    pub async fn dial(&self, network: &str, hostport: &str) -> Result<TcpStream, Error> {
        let network: Network = network.parse()?;
        let addr = self.resolver.resolve_safe_addr(hostport).await?;
        let stream = self.connect_ipv4(addr).await?;
        tracing::trace!(%network, addr = hostport, peer = %addr, "dialed");
        Ok(stream)
    }

    /// Open an IPv4 socket and connect it to `addr`.
    async fn connect_ipv4(&self, addr: SocketAddr) -> Result<TcpStream, Error> {
        if addr.is_ipv6() {
            return Err(Error::connect(
                addr,
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    "IPv6 destinations cannot be dialed over tcp4",
                ),
            ));
        }

        let socket = TcpSocket::new_v4().map_err(|e| Error::connect(addr, e))?;
        socket
            .set_keepalive(self.keepalive)
            .map_err(|e| Error::connect(addr, e))?;

        let connect = socket.connect(addr);
        let stream = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| Error::ConnectTimeout { addr, timeout })?,
            None => connect.await,
        };

        stream.map_err(|e| Error::connect(addr, e))
    }
}
