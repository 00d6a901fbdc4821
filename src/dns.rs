//! DNS backends.
//!
//! The safe resolver only needs "give me every address for this name, in the
//! order the backend prefers". [`Resolve`] is that seam; two backends ship with
//! the crate and tests plug in their own.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::error::Error;

/// A DNS backend.
///
/// Implementations return every address they found, in their own order. The
/// first address is the one that gets dialed, so order matters.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Look up all addresses for `host`.
    ///
    /// Returning an empty list is allowed; the caller treats it as a failure.
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, Error>;
}

/// Which built-in backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// The platform resolver (`getaddrinfo`), honoring `/etc/hosts` and nsswitch.
    #[default]
    System,
    /// An in-process hickory resolver using the system's nameserver config.
    Hickory,
}

impl ResolverKind {
    /// Instantiate the backend.
    pub fn build(self) -> Box<dyn Resolve> {
        match self {
            Self::System => Box::new(GaiResolver),
            Self::Hickory => Box::new(HickoryResolver::new()),
        }
    }
}

/// Platform resolver via `tokio::net::lookup_host`.
///
/// Runs `getaddrinfo` on Tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaiResolver;

#[async_trait]
impl Resolve for GaiResolver {
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| Error::dns_error(host, e.to_string()))?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Resolver backed by `hickory-resolver`.
///
/// The underlying resolver reads the system configuration on first use and is
/// reused afterwards.
#[derive(Default)]
pub struct HickoryResolver {
    inner: OnceCell<TokioResolver>,
}

impl HickoryResolver {
    /// Create a resolver; nothing is read until the first lookup.
    pub fn new() -> Self {
        Self::default()
    }

    async fn resolver(&self, host: &str) -> Result<&TokioResolver, Error> {
        self.inner
            .get_or_try_init(|| async {
                TokioResolver::builder_tokio().map(|builder| builder.build())
            })
            .await
            .map_err(|e| Error::dns_error(host, e.to_string()))
    }
}

impl fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HickoryResolver")
            .field("initialized", &self.inner.initialized())
            .finish()
    }
}

#[async_trait]
impl Resolve for HickoryResolver {
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        let resolver = self.resolver(host).await?;

        let response = resolver
            .lookup_ip(host)
            .await
            .map_err(|e| Error::dns_error(host, e.to_string()))?;

        Ok(response.iter().collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted resolver for tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Route `tracing` output to the test harness; `RUST_LOG` picks the level.
    pub(crate) fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Answers each lookup with the next scripted response; the last one repeats.
    pub(crate) struct ScriptedResolver {
        answers: Mutex<VecDeque<Vec<IpAddr>>>,
        calls: AtomicUsize,
    }

    impl ScriptedResolver {
        pub(crate) fn new(answers: Vec<Vec<&str>>) -> Self {
            let answers = answers
                .into_iter()
                .map(|batch| batch.into_iter().map(|ip| ip.parse().unwrap()).collect())
                .collect();
            Self {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
            }
        }

        /// Same answer on every lookup.
        pub(crate) fn fixed(answer: Vec<&str>) -> Self {
            Self::new(vec![answer])
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Resolve for ScriptedResolver {
        async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            let answer = if answers.len() > 1 {
                answers.pop_front()
            } else {
                answers.front().cloned()
            };
            answer.ok_or_else(|| Error::dns_error(host, "no scripted answer"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedResolver;
    use super::*;

    #[tokio::test]
    async fn test_gai_resolves_ip_literal() {
        let ips = GaiResolver.lookup_ip("127.0.0.1").await.unwrap();
        assert_eq!(ips, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn test_gai_reports_failure() {
        let result = GaiResolver.lookup_ip("does-not-exist.invalid").await;
        assert!(matches!(result, Err(Error::DnsError { host, .. }) if host == "does-not-exist.invalid"));
    }

    #[tokio::test]
    async fn test_scripted_resolver_advances_then_repeats() {
        let resolver = ScriptedResolver::new(vec![vec!["1.1.1.1"], vec!["8.8.8.8"]]);
        let first = resolver.lookup_ip("a").await.unwrap();
        let second = resolver.lookup_ip("a").await.unwrap();
        let third = resolver.lookup_ip("a").await.unwrap();
        assert_eq!(first, vec!["1.1.1.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(second, third);
        assert_eq!(resolver.calls(), 3);
    }

    #[test]
    fn test_resolver_kind_default_is_system() {
        assert_eq!(ResolverKind::default(), ResolverKind::System);
    }

    #[test]
    fn test_hickory_debug_before_first_lookup() {
        let resolver = HickoryResolver::new();
        assert!(format!("{:?}", resolver).contains("initialized: false"));
    }
}
