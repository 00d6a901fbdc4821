//! `host:port` validation with DNS resolution.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use crate::classify::Classifier;
use crate::dns::{GaiResolver, Resolve};
use crate::error::Error;
use crate::hostport::split_host_port;

/// Turns an untrusted `host:port` into one vetted socket address.
///
/// Cloning is cheap; clones share the DNS backend and the blocklist.
#[derive(Clone)]
pub struct SafeResolver {
    classifier: Classifier,
    dns: Arc<dyn Resolve>,
    lookup_timeout: Option<Duration>,
}

impl Default for SafeResolver {
    fn default() -> Self {
        Self::new(Classifier::default(), Arc::new(GaiResolver))
    }
}

impl fmt::Debug for SafeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeResolver")
            .field("classifier", &self.classifier)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl SafeResolver {
    /// A resolver with no lookup timeout.
    pub fn new(classifier: Classifier, dns: Arc<dyn Resolve>) -> Self {
        Self {
            classifier,
            dns,
            lookup_timeout: None,
        }
    }

    /// Bound each DNS lookup. `None` (the default) leaves the lookup to the
    /// caller's own deadline.
    pub fn with_lookup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// The classifier used for every check.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Validate `hostport` and pick the address to connect to.
    ///
    /// 1. Splits host and port
    /// 2. IP literals: IPv4 is checked against the classifier, IPv6 passes through
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`), literal or resolved, are
    /// treated as the IPv4 address they carry and returned in IPv4 form.
    /// 3. Hostnames: checked against the hostname rules, then resolved
    /// 4. Every resolved IPv4 address is checked; one bad answer fails the lookup
    /// 5. The first resolved address is returned
    ///
    /// The returned address is what must be dialed. Resolving the name again
    /// would reopen the window for DNS rebinding.
    ///
    /// # Example
    ///
    /// ```rust
    /// use dial_jail::SafeResolver;
    ///
    /// # async fn example() -> Result<(), dial_jail::Error> {
    /// let resolver = SafeResolver::default();
    /// let addr = resolver.resolve_safe_addr("93.184.216.34:80").await?;
    /// assert_eq!(addr.to_string(), "93.184.216.34:80");
    ///
    /// assert!(resolver.resolve_safe_addr("127.0.0.1:80").await.is_err());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if `hostport` is malformed
    /// - [`Error::HostnameBlocked`] if the hostname is rejected before lookup
    /// - [`Error::DnsError`] if resolution fails, times out or finds nothing
    /// - [`Error::SsrfBlocked`] if the literal or any resolved IPv4 address is bad
    pub async fn resolve_safe_addr(&self, hostport: &str) -> Result<SocketAddr, Error> {
        let (host, port) = split_host_port(hostport)?;

        if let Ok(ip) = host.parse::<IpAddr>() {
            // ::ffff:a.b.c.d is an IPv4 destination
            let ip = ip.to_canonical();
            if let IpAddr::V4(v4) = ip {
                if let Some(reason) = self.classifier.check_ipv4(v4) {
                    tracing::debug!(addr = hostport, ip = %v4, %reason, "blocked IP literal");
                    return Err(Error::ssrf_blocked(hostport, v4, reason));
                }
            }
            return Ok(SocketAddr::new(ip, port));
        }

        if let Some(reason) = self.classifier.check_host(host) {
            tracing::debug!(addr = hostport, host, %reason, "blocked hostname");
            return Err(Error::hostname_blocked(hostport, host, reason));
        }

        let ips: Vec<IpAddr> = self
            .lookup(host)
            .await?
            .into_iter()
            .map(|ip| ip.to_canonical())
            .collect();

        // Check the whole answer set before choosing from it.
        for ip in &ips {
            if let IpAddr::V4(v4) = ip {
                if let Some(reason) = self.classifier.check_ipv4(*v4) {
                    tracing::debug!(addr = hostport, host, ip = %v4, %reason, "blocked resolved address");
                    return Err(Error::ssrf_blocked(hostport, *v4, reason));
                }
            }
        }

        let chosen = SocketAddr::new(ips[0], port);
        tracing::trace!(addr = hostport, answers = ips.len(), %chosen, "resolved safe address");
        Ok(chosen)
    }

    /// Synchronous version of [`resolve_safe_addr`](Self::resolve_safe_addr).
    ///
    /// This blocks the current thread while performing DNS resolution.
    /// Prefer the async version when possible.
    ///
    /// Works inside a multi-threaded Tokio runtime and outside of any runtime;
    /// outside one, a temporary runtime is created.
    pub fn resolve_safe_addr_blocking(&self, hostport: &str) -> Result<SocketAddr, Error> {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.resolve_safe_addr(hostport)))
        } else {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::dns_error("runtime", e.to_string()))?;
            rt.block_on(self.resolve_safe_addr(hostport))
        }
    }

    /// Resolve `host`, never returning an empty list.
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        let ips = match self.lookup_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.dns.lookup_ip(host))
                .await
                .map_err(|_| {
                    Error::dns_error(host, format!("lookup timed out after {:?}", timeout))
                })??,
            None => self.dns.lookup_ip(host).await?,
        };

        if ips.is_empty() {
            return Err(Error::dns_error(host, "no IP addresses found"));
        }
        Ok(ips)
    }
}
