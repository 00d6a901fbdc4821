//! Error types for dial_jail.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while vetting or opening a connection.
#[derive(Debug, Error)]
pub enum Error {
    /// The `host:port` string could not be split or parsed.
    #[error("Invalid address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// Hostname is blocked before any DNS lookup.
    #[error("SSRF blocked: {host} - {reason}")]
    HostnameBlocked {
        addr: String,
        host: String,
        reason: String,
    },

    /// IPv4 address (literal or resolved) is in blocked space.
    #[error("SSRF blocked: {ip} - {reason}")]
    SsrfBlocked {
        addr: String,
        ip: Ipv4Addr,
        reason: String,
    },

    /// DNS resolution failed or returned nothing.
    #[error("DNS error for {host}: {message}")]
    DnsError { host: String, message: String },

    /// A network family other than `tcp`/`tcp4` was requested.
    #[error("Unsupported network {network:?}: only tcp and tcp4 are allowed")]
    UnsupportedNetwork { network: String },

    /// The socket could not be opened or connected.
    #[error("Connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The TCP handshake did not finish in time.
    #[error("Connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },

    /// Configuration values are out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The HTTP exchange failed. The dial failure, if any, is in the source chain.
    #[cfg(feature = "client")]
    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// The whole request did not finish in time.
    #[cfg(feature = "client")]
    #[error("Request to {url} timed out after {timeout:?}")]
    RequestTimeout { url: String, timeout: Duration },
}

impl Error {
    /// Whether this error, or the dial failure behind it, is an SSRF block.
    pub fn is_blocked(&self) -> bool {
        matches!(
            self.dial_error(),
            Some(Self::HostnameBlocked { .. } | Self::SsrfBlocked { .. })
        )
    }

    /// Find the dial failure behind this error.
    ///
    /// For dial errors this is `self`. For [`Error::Http`] the source chain is
    /// walked until the connector's own error is found, so callers can still
    /// tell an SSRF block apart from a generic transport failure.
    pub fn dial_error(&self) -> Option<&Error> {
        #[cfg(feature = "client")]
        if let Self::Http { source, .. } = self {
            let mut cause: Option<&(dyn std::error::Error + 'static)> =
                std::error::Error::source(source);
            while let Some(err) = cause {
                if let Some(found) = err.downcast_ref::<Error>() {
                    return Some(found);
                }
                cause = err.source();
            }
            return None;
        }

        Some(self)
    }

    pub(crate) fn invalid_address(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn hostname_blocked(
        addr: impl Into<String>,
        host: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::HostnameBlocked {
            addr: addr.into(),
            host: host.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn ssrf_blocked(addr: impl Into<String>, ip: Ipv4Addr, reason: impl ToString) -> Self {
        Self::SsrfBlocked {
            addr: addr.into(),
            ip,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn dns_error(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DnsError {
            host: host.into(),
            message: message.into(),
        }
    }

    pub(crate) fn connect(addr: SocketAddr, source: io::Error) -> Self {
        Self::Connect { addr, source }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
