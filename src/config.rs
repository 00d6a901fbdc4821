//! Configuration for building resolvers, dialers and clients.
//!
//! [`Config`] is meant to be embedded in an application's own config file:
//!
//! ```toml
//! [outbound]
//! resolver = "hickory"
//! lookup_timeout_secs = 5
//! blocked_cidrs = ["100.64.0.0/10"]
//! blocked_hosts = ["*.internal", "metadata.google.internal"]
//! ```
//!
//! Every field has a default, so an empty table is valid.

use std::sync::Arc;
use std::time::Duration;

use ipnet::Ipv4Net;
use serde::Deserialize;

use crate::classify::Classifier;
use crate::dial::Dialer;
use crate::dns::ResolverKind;
use crate::error::Error;
use crate::validate::SafeResolver;

/// Outbound connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// DNS backend.
    pub resolver: ResolverKind,

    /// Per-lookup DNS timeout. Unset means no timeout of our own.
    pub lookup_timeout_secs: Option<u64>,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Enable `SO_KEEPALIVE` on dialed sockets.
    pub tcp_keepalive: bool,

    /// Whole-request timeout for the HTTP client in seconds.
    pub request_timeout_secs: u64,

    /// How long idle pooled connections are kept, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// IPv4 ranges blocked in addition to the standard ones.
    pub blocked_cidrs: Vec<Ipv4Net>,

    /// IPv4 ranges exempt from every rule. Dangerous: only for audited cases.
    pub allowed_cidrs: Vec<Ipv4Net>,

    /// Hostnames or `*.suffix` patterns that are never resolved.
    pub blocked_hosts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolver: ResolverKind::default(),
            lookup_timeout_secs: None,
            connect_timeout_secs: 30,
            tcp_keepalive: true,
            request_timeout_secs: 30,
            pool_idle_timeout_secs: 90,
            blocked_cidrs: Vec::new(),
            allowed_cidrs: Vec::new(),
            blocked_hosts: Vec::new(),
        }
    }
}

impl Config {
    /// Reject values that would make every connection fail.
    pub fn validate(&self) -> Result<(), Error> {
        if self.lookup_timeout_secs == Some(0) {
            return Err(Error::invalid_config("lookup_timeout_secs must be positive"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::invalid_config("connect_timeout_secs must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::invalid_config("request_timeout_secs must be positive"));
        }
        if let Some(host) = self.blocked_hosts.iter().find(|h| h.trim().is_empty()) {
            return Err(Error::invalid_config(format!(
                "blocked_hosts contains an empty pattern: {:?}",
                host
            )));
        }
        Ok(())
    }

    /// The classifier described by the CIDR and hostname rules.
    pub fn classifier(&self) -> Classifier {
        let mut builder = Classifier::builder();
        for net in &self.blocked_cidrs {
            builder = builder.block_cidr(*net);
        }
        for net in &self.allowed_cidrs {
            builder = builder.allow_cidr(*net);
        }
        for host in &self.blocked_hosts {
            builder = builder.block_host(host);
        }
        builder.build()
    }

    /// A safe resolver using the configured backend and lookup timeout.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if [`validate`](Self::validate) fails.
    pub fn safe_resolver(&self) -> Result<SafeResolver, Error> {
        self.validate()?;
        Ok(
            SafeResolver::new(self.classifier(), Arc::from(self.resolver.build()))
                .with_lookup_timeout(self.lookup_timeout()),
        )
    }

    /// A dialer using the configured resolver and socket options.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if [`validate`](Self::validate) fails.
    pub fn dialer(&self) -> Result<Dialer, Error> {
        Ok(Dialer::new(self.safe_resolver()?)
            .with_connect_timeout(Some(self.connect_timeout()))
            .with_keepalive(self.tcp_keepalive))
    }

    /// A pooled HTTP client built from every setting here.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if [`validate`](Self::validate) fails.
    #[cfg(feature = "client")]
    pub fn client(&self) -> Result<crate::client::SafeClient, Error> {
        crate::client::SafeClient::from_config(self)
    }

    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct AppConfig {
        outbound: Config,
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.resolver, ResolverKind::System);
        assert_eq!(config.lookup_timeout(), None);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.tcp_keepalive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_table_is_default() {
        let app: AppConfig = toml::from_str("[outbound]\n").unwrap();
        assert_eq!(app.outbound, Config::default());
    }

    #[test]
    fn test_parse_toml() {
        let app: AppConfig = toml::from_str(
            r#"
            [outbound]
            resolver = "hickory"
            lookup_timeout_secs = 5
            connect_timeout_secs = 10
            tcp_keepalive = false
            blocked_cidrs = ["100.64.0.0/10"]
            allowed_cidrs = ["10.20.0.0/16"]
            blocked_hosts = ["*.internal"]
            "#,
        )
        .unwrap();
        let config = app.outbound;

        assert_eq!(config.resolver, ResolverKind::Hickory);
        assert_eq!(config.lookup_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(!config.tcp_keepalive);
        assert_eq!(config.blocked_cidrs, vec!["100.64.0.0/10".parse::<Ipv4Net>().unwrap()]);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_parse_json() {
        let config: Config =
            serde_json::from_str(r#"{"resolver": "system", "blocked_hosts": ["metadata.goog"]}"#)
                .unwrap();
        assert_eq!(config.blocked_hosts, vec!["metadata.goog".to_string()]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<Config, _> = serde_json::from_str(r#"{"proxy": "http://x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_cidr_rejected() {
        let result: Result<Config, _> = serde_json::from_str(r#"{"blocked_cidrs": ["10.0.0.0/40"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let config = Config {
            connect_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));

        let config = Config {
            lookup_timeout_secs: Some(0),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_builders_reject_invalid_config() {
        let config = Config {
            connect_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.dialer(), Err(Error::InvalidConfig { .. })));

        let config = Config {
            lookup_timeout_secs: Some(0),
            ..Config::default()
        };
        assert!(matches!(config.safe_resolver(), Err(Error::InvalidConfig { .. })));
    }

    #[cfg(feature = "client")]
    #[test]
    fn test_client_rejects_invalid_config() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.client(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_validate_rejects_empty_host_pattern() {
        let config = Config {
            blocked_hosts: vec!["  ".into()],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_classifier_from_rules() {
        let config = Config {
            blocked_cidrs: vec!["100.128.0.0/16".parse().unwrap()],
            allowed_cidrs: vec!["10.20.0.0/16".parse().unwrap()],
            blocked_hosts: vec!["*.corp".into()],
            ..Config::default()
        };
        let classifier = config.classifier();

        assert!(classifier.is_bad_ipv4(Ipv4Addr::new(100, 128, 0, 1)));
        assert!(!classifier.is_bad_ipv4(Ipv4Addr::new(10, 20, 1, 1)));
        assert!(classifier.is_bad_ipv4(Ipv4Addr::new(10, 21, 1, 1)));
        assert!(classifier.is_bad_host("git.corp"));
        assert!(!classifier.is_bad_host("example.com"));
    }

    #[tokio::test]
    async fn test_dialer_from_config_enforces_rules() {
        let config = Config {
            blocked_hosts: vec!["*.corp".into()],
            ..Config::default()
        };
        let dialer = config.dialer().unwrap();

        let result = dialer.dial("tcp", "git.corp:443").await;
        assert!(matches!(result, Err(Error::HostnameBlocked { .. })));

        let result = dialer.dial("tcp", "10.0.0.1:443").await;
        assert!(matches!(result, Err(Error::SsrfBlocked { .. })));
    }

    #[cfg(feature = "client")]
    #[tokio::test]
    async fn test_client_from_config_enforces_rules() {
        let config = Config {
            blocked_hosts: vec!["metadata.google.internal".into()],
            ..Config::default()
        };
        let err = config
            .client()
            .unwrap()
            .get("http://metadata.google.internal/".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err.dial_error(),
            Some(Error::HostnameBlocked { host, .. }) if host == "metadata.google.internal"
        ));
    }
}
