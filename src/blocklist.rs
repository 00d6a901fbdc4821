//! Fixed IPv4 ranges that are never dialed.

use std::net::Ipv4Addr;
use std::sync::{Arc, LazyLock};

use ipnet::Ipv4Net;

/// Non-public IPv4 space checked on every dial.
///
/// Loopback, link-local, multicast and friends are covered separately by the
/// global unicast check, so only ranges that check lets through live here.
const BLOCKED_IPV4_CIDRS: &[&str] = &[
    "10.0.0.0/8",     // private class A
    "172.16.0.0/12",  // private class B
    "192.168.0.0/16", // private class C
    "192.0.2.0/24",   // TEST-NET-1
    "192.88.99.0/24", // 6to4 relay anycast
];

static STANDARD: LazyLock<Arc<Blocklist>> =
    LazyLock::new(|| Arc::new(Blocklist::from_literals(BLOCKED_IPV4_CIDRS)));

/// An immutable, ordered set of blocked IPv4 networks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocklist {
    ranges: Vec<Ipv4Net>,
}

impl Blocklist {
    /// The standard ranges, parsed once per process and shared.
    ///
    /// # Panics
    ///
    /// Panics on first use if one of the built-in CIDR literals fails to
    /// parse. That can only happen if the crate itself is broken.
    pub fn standard() -> Arc<Blocklist> {
        Arc::clone(&STANDARD)
    }

    /// The standard ranges followed by `extra`.
    pub fn with_ranges(extra: impl IntoIterator<Item = Ipv4Net>) -> Blocklist {
        let mut ranges = STANDARD.ranges.clone();
        for net in extra {
            if !ranges.contains(&net) {
                ranges.push(net);
            }
        }
        Blocklist { ranges }
    }

    fn from_literals(literals: &[&str]) -> Blocklist {
        let ranges = literals
            .iter()
            .map(|cidr| {
                cidr.parse::<Ipv4Net>()
                    .unwrap_or_else(|e| panic!("{} must be parsed: {}", cidr, e))
            })
            .collect();
        Blocklist { ranges }
    }

    /// Check if `ip` falls in any blocked network.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.matching(ip).is_some()
    }

    /// The first blocked network containing `ip`.
    pub fn matching(&self, ip: Ipv4Addr) -> Option<Ipv4Net> {
        self.ranges.iter().copied().find(|net| net.contains(&ip))
    }

    /// All blocked networks, in check order.
    pub fn ranges(&self) -> &[Ipv4Net] {
        &self.ranges
    }
}
