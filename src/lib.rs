//! # dial_jail
//!
//! SSRF-safe connection establishment for HTTP clients.
//!
//! `dial_jail` sits where an HTTP transport opens its TCP connections. Every
//! destination is resolved once, every resolved address is checked, and the
//! socket is connected to exactly the address that was checked. Loopback,
//! link-local, private, reserved and documentation space is never dialed, and
//! only IPv4 connections are made.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dial_jail::Dialer;
//!
//! # async fn example() -> Result<(), dial_jail::Error> {
//! let dialer = Dialer::default();
//! let stream = dialer.dial("tcp", "example.com:80").await?;
//! println!("connected to {}", stream.peer_addr().unwrap());
//!
//! // Internal destinations are refused before any socket is opened.
//! assert!(dialer.dial("tcp", "169.254.169.254:80").await.is_err());
//! # Ok(())
//! # }
//! ```
//!
//! With the `client` feature (on by default) the dialer is wired into a
//! pooled HTTP client:
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), dial_jail::Error> {
//! let response = dial_jail::default_client()
//!     .get("http://example.com/".parse().unwrap())
//!     .await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

mod blocklist;
mod classify;
mod config;
mod dial;
mod dns;
mod error;
mod hostport;
mod validate;

#[cfg(feature = "client")]
mod client;

pub use blocklist::Blocklist;
pub use classify::{is_global_unicast, BlockReason, Classifier, ClassifierBuilder};
pub use config::Config;
pub use dial::{Dialer, Network, DEFAULT_CONNECT_TIMEOUT};
pub use dns::{GaiResolver, HickoryResolver, Resolve, ResolverKind};
pub use error::Error;
pub use validate::SafeResolver;

#[cfg(feature = "client")]
pub use client::{default_client, Body, SafeClient, SafeConnector};

/// Re-exported so [`Resolve`] can be implemented without a direct dependency.
pub use async_trait::async_trait;
