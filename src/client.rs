//! HTTP client wiring.
//!
//! [`SafeConnector`] is the connection hook for hyper-util's pooled client:
//! every new connection goes through [`Dialer::dial`]. [`SafeClient`] is that
//! client, with no proxy support and no redirect following, so there is no
//! path to a socket that skips the dialer.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tower_service::Service;

use crate::config::Config;
use crate::dial::Dialer;
use crate::error::Error;

/// Request body type accepted by [`SafeClient`].
pub type Body = Full<Bytes>;

// Same settings as `Config::default()`, which always validates.
static DEFAULT_CLIENT: LazyLock<SafeClient> = LazyLock::new(|| SafeClient::new(Dialer::default()));

/// The shared client with default settings.
///
/// It speaks plain `http` only: `https` URIs fail with
/// [`Error::InvalidAddress`] before any lookup. For TLS, build a
/// [`SafeConnector`] with [`enforce_http(false)`](SafeConnector::enforce_http)
/// and wrap it in a TLS connector that performs the handshake over the
/// returned stream, such as `hyper_rustls::HttpsConnectorBuilder::wrap_connector`.
pub fn default_client() -> &'static SafeClient {
    &DEFAULT_CLIENT
}

/// A hyper-util connector that only opens vetted connections.
#[derive(Debug, Clone)]
pub struct SafeConnector {
    dialer: Arc<Dialer>,
    enforce_http: bool,
}

impl SafeConnector {
    /// Wrap `dialer`. Only `http` URIs are accepted by default.
    pub fn new(dialer: Dialer) -> Self {
        Self {
            dialer: Arc::new(dialer),
            enforce_http: true,
        }
    }

    /// Allow schemes other than `http`.
    ///
    /// Set this to `false` when a TLS connector wraps this one and performs
    /// the handshake on top of the returned stream.
    pub fn enforce_http(mut self, enforce: bool) -> Self {
        self.enforce_http = enforce;
        self
    }

    fn hostport(&self, dst: &Uri) -> Result<String, Error> {
        let scheme = dst.scheme_str();
        if self.enforce_http && scheme != Some("http") {
            return Err(Error::invalid_address(
                dst.to_string(),
                format!("scheme {:?} not allowed, only http", scheme.unwrap_or("")),
            ));
        }

        let host = dst
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::invalid_address(dst.to_string(), "URI must have a host"))?;

        let port = match (dst.port_u16(), scheme) {
            (Some(port), _) => port,
            (None, Some("http")) => 80,
            (None, Some("https")) => 443,
            (None, _) => {
                return Err(Error::invalid_address(dst.to_string(), "missing port"));
            }
        };

        if host.contains(':') {
            Ok(format!("[{}]:{}", host, port))
        } else {
            Ok(format!("{}:{}", host, port))
        }
    }
}

type Connecting = Pin<Box<dyn Future<Output = Result<TokioIo<TcpStream>, Error>> + Send>>;

impl Service<Uri> for SafeConnector {
    type Response = TokioIo<TcpStream>;
    type Error = Error;
    type Future = Connecting;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let hostport = self.hostport(&dst);
        let dialer = Arc::clone(&self.dialer);

        Box::pin(async move {
            let hostport = hostport?;
            let stream = dialer.dial("tcp", &hostport).await?;
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(addr = %hostport, error = %e, "failed to set TCP_NODELAY");
            }
            Ok(TokioIo::new(stream))
        })
    }
}

/// A pooled HTTP/1 client whose connections all go through a [`Dialer`].
#[derive(Debug, Clone)]
pub struct SafeClient {
    inner: Client<SafeConnector, Body>,
    request_timeout: Option<Duration>,
}

impl SafeClient {
    /// A client over `dialer` with a 30 second request timeout.
    pub fn new(dialer: Dialer) -> Self {
        Self::with_connector(SafeConnector::new(dialer), Duration::from_secs(90))
            .with_request_timeout(Some(Duration::from_secs(30)))
    }

    /// A client with every setting taken from `config`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if [`Config::validate`] fails.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let connector = SafeConnector::new(config.dialer()?);
        Ok(Self::with_connector(connector, config.pool_idle_timeout())
            .with_request_timeout(Some(config.request_timeout())))
    }

    fn with_connector(connector: SafeConnector, pool_idle_timeout: Duration) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(pool_idle_timeout)
            .pool_timer(TokioTimer::new())
            .build(connector);

        Self {
            inner,
            request_timeout: None,
        }
    }

    /// Bound the whole request (connect, send, response head).
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Send a request. Redirect responses are returned as-is.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] if the exchange fails; [`Error::dial_error`] gives the
    ///   dial failure, such as [`Error::SsrfBlocked`]
    /// - [`Error::RequestTimeout`] if the request timeout elapses
    pub async fn request(&self, req: Request<Body>) -> Result<Response<Incoming>, Error> {
        let url = req.uri().to_string();
        let pending = self.inner.request(req);

        let result = match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending)
                .await
                .map_err(|_| Error::RequestTimeout {
                    url: url.clone(),
                    timeout,
                })?,
            None => pending.await,
        };

        result.map_err(|source| {
            tracing::debug!(%url, error = %source, "request failed");
            Error::Http { url, source }
        })
    }

    /// Send a `GET` request with an empty body.
    pub async fn get(&self, uri: Uri) -> Result<Response<Incoming>, Error> {
        let req = Request::get(uri)
            .body(Body::default())
            .map_err(|e| Error::invalid_address("request", e.to_string()))?;
        self.request(req).await
    }
}
