//! Deciding whether a hostname or IPv4 address may be dialed.
//!
//! A [`Classifier`] is a plain value: it holds the shared [`Blocklist`] plus any
//! custom rules, and is cheap to clone into every resolver and dialer.
//!
//! ## Custom rules
//!
//! [`ClassifierBuilder`] adds rules on top of the standard policy:
//!
//! - `block_cidr` / `block_host` only ever make the policy stricter.
//! - `allow_cidr` exempts a range from **every** IPv4 rule, including loopback:
//!
//! ```rust
//! use dial_jail::Classifier;
//!
//! // DANGEROUS: this lets the dialer reach services on the local host.
//! let classifier = Classifier::builder()
//!     .allow_cidr("127.0.0.0/8".parse().unwrap())
//!     .build();
//! assert!(!classifier.is_bad_ipv4("127.0.0.1".parse().unwrap()));
//! ```
//!
//! Only use `allow_cidr` for a specific, audited case.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use ipnet::Ipv4Net;

use crate::blocklist::Blocklist;

/// Why a hostname or address was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Hostname is `localhost`.
    Localhost,
    /// Hostname contains whitespace.
    Whitespace,
    /// Custom hostname rule matched.
    HostRule(String),
    /// Limited broadcast address.
    Broadcast,
    /// Loopback, link-local, multicast, reserved, etc.
    NotGlobalUnicast,
    /// Address inside a blocked network.
    BlockedRange(Ipv4Net),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Localhost => f.write_str("localhost is never dialed"),
            Self::Whitespace => f.write_str("hostname contains whitespace"),
            Self::HostRule(pattern) => write!(f, "blocked by hostname rule: {}", pattern),
            Self::Broadcast => f.write_str("broadcast address (255.255.255.255)"),
            Self::NotGlobalUnicast => f.write_str("not a global unicast address"),
            Self::BlockedRange(net) => write!(f, "inside blocked range {}", net),
        }
    }
}

/// Hostname and IPv4 classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    blocklist: Arc<Blocklist>,
    allowed_cidrs: Vec<Ipv4Net>,
    blocked_hosts: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Blocklist::standard())
    }
}

impl Classifier {
    /// A classifier over `blocklist` with no custom rules.
    pub fn new(blocklist: Arc<Blocklist>) -> Self {
        Self {
            blocklist,
            allowed_cidrs: Vec::new(),
            blocked_hosts: Vec::new(),
        }
    }

    /// Start a classifier with custom rules on top of the standard blocklist.
    pub fn builder() -> ClassifierBuilder {
        ClassifierBuilder::default()
    }

    /// The blocklist this classifier checks against.
    pub fn blocklist(&self) -> &Blocklist {
        &self.blocklist
    }

    /// Check if a hostname must never be resolved.
    ///
    /// Only meant for DNS names; IP literals go through [`is_bad_ipv4`](Self::is_bad_ipv4).
    pub fn is_bad_host(&self, host: &str) -> bool {
        self.check_host(host).is_some()
    }

    /// Check if an IPv4 address must never be dialed.
    pub fn is_bad_ipv4(&self, ip: Ipv4Addr) -> bool {
        self.check_ipv4(ip).is_some()
    }

    /// Like [`is_bad_host`](Self::is_bad_host), with the reason.
    pub fn check_host(&self, host: &str) -> Option<BlockReason> {
        if host.eq_ignore_ascii_case("localhost") {
            return Some(BlockReason::Localhost);
        }

        if host.chars().any(char::is_whitespace) {
            return Some(BlockReason::Whitespace);
        }

        if !self.blocked_hosts.is_empty() {
            let host_lower = host.to_ascii_lowercase();
            for pattern in &self.blocked_hosts {
                if matches_hostname_pattern(&host_lower, pattern) {
                    return Some(BlockReason::HostRule(pattern.clone()));
                }
            }
        }

        None
    }

    /// Like [`is_bad_ipv4`](Self::is_bad_ipv4), with the reason.
    pub fn check_ipv4(&self, ip: Ipv4Addr) -> Option<BlockReason> {
        if self.allowed_cidrs.iter().any(|net| net.contains(&ip)) {
            return None;
        }

        if ip.is_broadcast() {
            return Some(BlockReason::Broadcast);
        }

        if !is_global_unicast(ip) {
            return Some(BlockReason::NotGlobalUnicast);
        }

        self.blocklist.matching(ip).map(BlockReason::BlockedRange)
    }
}

/// Builder for a [`Classifier`] with custom rules.
///
/// Precedence, first match wins:
/// 1. `allow_cidr` ranges → allowed
/// 2. broadcast, non global unicast, standard and `block_cidr` ranges → blocked
/// 3. otherwise allowed
#[derive(Debug, Clone, Default)]
pub struct ClassifierBuilder {
    blocked_cidrs: Vec<Ipv4Net>,
    allowed_cidrs: Vec<Ipv4Net>,
    blocked_hosts: Vec<String>,
}

impl ClassifierBuilder {
    /// Block an additional IPv4 range.
    pub fn block_cidr(mut self, net: Ipv4Net) -> Self {
        self.blocked_cidrs.push(net);
        self
    }

    /// Exempt an IPv4 range from every rule.
    pub fn allow_cidr(mut self, net: Ipv4Net) -> Self {
        self.allowed_cidrs.push(net);
        self
    }

    /// Block a hostname or pattern.
    ///
    /// Supports wildcards: `*.internal.example.com`
    pub fn block_host(mut self, pattern: &str) -> Self {
        self.blocked_hosts.push(pattern.to_ascii_lowercase());
        self
    }

    /// Build the classifier.
    pub fn build(self) -> Classifier {
        let blocklist = if self.blocked_cidrs.is_empty() {
            Blocklist::standard()
        } else {
            Arc::new(Blocklist::with_ranges(self.blocked_cidrs))
        };

        Classifier {
            blocklist,
            allowed_cidrs: self.allowed_cidrs,
            blocked_hosts: self.blocked_hosts,
        }
    }
}

/// Check if an IPv4 address is routable unicast on the public Internet.
///
/// Same ranges as the standard library's (unstable) `Ipv4Addr::is_global`,
/// with multicast excluded as well.
pub fn is_global_unicast(ip: Ipv4Addr) -> bool {
    let [a, b, c, d] = ip.octets();

    let this_network = a == 0;
    let shared = a == 100 && (b & 0b1100_0000) == 0b0100_0000;
    // 192.0.0.0/24 except the two anycast relays
    let protocol_assignment = a == 192 && b == 0 && c == 0 && d != 9 && d != 10;
    let benchmarking = a == 198 && (b & 0xfe) == 18;
    let reserved = (a & 0xf0) == 240;

    !(this_network
        || ip.is_private()
        || shared
        || ip.is_loopback()
        || ip.is_link_local()
        || protocol_assignment
        || ip.is_documentation()
        || benchmarking
        || reserved
        || ip.is_broadcast()
        || ip.is_multicast())
}

/// Match a lowercase hostname against a pattern (supports * wildcard).
fn matches_hostname_pattern(host: &str, pattern: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&pattern[1..]),
        None => host == pattern,
    }
}
