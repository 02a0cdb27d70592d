//! # HTTP Server
//!
//! HTTP/1 server built on Hyper and Tokio.
//!
//! ## Key Features
//!
//! - One task per connection; the router is shared read-only via `Arc`
//! - Graceful shutdown on Ctrl-C: open connections finish their current
//!   request and close, bounded by a drain timeout
//! - Request ids assigned when the client sends none, echoed on the response
//! - Payload and method errors rendered as envelopes, never as bare text

use crate::config::ServerSettings;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::{Response, JSON_CONTENT_TYPE};
use crate::router::Router;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Header carrying the per-request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Build from the `[server]` section of the application config
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the address is not a socket address.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self> {
        let address = settings.address.parse().map_err(|e| Error::Config {
            message: format!("server.address '{}': {e}", settings.address),
        })?;
        Ok(Self {
            address,
            keep_alive: settings.keep_alive,
            shutdown_timeout: settings.shutdown_timeout(),
            max_body_size: settings.max_body_size,
        })
    }
}

/// HTTP server wrapping a finished router
#[derive(Clone)]
pub struct Server {
    config: ServerConfig,
    router: Arc<Router>,
}

impl Server {
    /// Create a server with default settings
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            config: ServerConfig::default(),
            router: Arc::new(router),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub const fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind the server to an address
    #[must_use]
    pub const fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shared router
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the address cannot be bound, or an IO
    /// error if accepting fails.
    pub async fn serve(&self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` completes
    ///
    /// # Errors
    ///
    /// See [`Server::serve`].
    pub async fn serve_with_shutdown<F: Future<Output = ()>>(&self, signal: F) -> Result<()> {
        let addr = self.config.address;
        let bind_error = |source: std::io::Error| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(1024).map_err(bind_error)?;

        self.run(listener, signal).await
    }

    /// Accept connections from `listener` until `signal` completes
    ///
    /// # Errors
    ///
    /// Returns an IO error if accepting fails.
    pub async fn run<F: Future<Output = ()>>(
        &self,
        listener: TcpListener,
        signal: F,
    ) -> Result<()> {
        info!("Server listening on http://{}", listener.local_addr()?);

        let active = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);
                    let server = self.clone();
                    let active = Arc::clone(&active);
                    let mut shutdown_rx = shutdown_rx.clone();

                    active.fetch_add(1, Ordering::SeqCst);
                    tokio::task::spawn(async move {
                        let keep_alive = server.config.keep_alive;
                        let service = service_fn(move |req| {
                            let server = server.clone();
                            async move {
                                Ok::<_, Infallible>(server.handle_hyper(req, remote_addr).await)
                            }
                        });

                        let conn = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service);
                        tokio::pin!(conn);

                        let mut draining = false;
                        let result = loop {
                            tokio::select! {
                                result = conn.as_mut() => break result,
                                _ = shutdown_rx.changed(), if !draining => {
                                    // finish the in-flight request, then close
                                    draining = true;
                                    conn.as_mut().graceful_shutdown();
                                }
                            }
                        };
                        if let Err(err) = result {
                            debug!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                () = &mut signal => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let _ = shutdown_tx.send(true);
        let drain = async {
            while active.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain).await.is_err() {
            warn!(
                open = active.load(Ordering::SeqCst),
                "Shutdown timeout elapsed with connections still open"
            );
        }
        Ok(())
    }

    /// Run a request through the pipeline without the network stack
    #[must_use]
    pub fn handle(&self, mut request: Request) -> Response {
        let request_id = match request.header(REQUEST_ID_HEADER) {
            Some(id) => id.to_string(),
            None => {
                let id = generate_request_id();
                request.set_header(REQUEST_ID_HEADER, &id);
                id
            }
        };

        self.router
            .dispatch(request)
            .with_header(REQUEST_ID_HEADER, &request_id)
    }

    async fn handle_hyper(
        &self,
        req: hyper::Request<hyper::body::Incoming>,
        remote_addr: SocketAddr,
    ) -> hyper::Response<Full<Bytes>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let version = req.version();

        let limit = self.config.max_body_size;
        let parsed = Request::from_hyper_with_limit(req, limit, Some(remote_addr.ip())).await;
        let response = match parsed {
            Ok(request) => self.handle(request),
            Err(e) => {
                warn!(method = %method, path = %path, "Request rejected: {}", e);
                Response::from_error(&e)
            }
        };

        let status = response.status;
        if status >= 500 {
            error!("    {} - \"{} {} {:?}\" {}", remote_addr, method, path, version, status);
        } else {
            info!("    {} - \"{} {} {:?}\" {}", remote_addr, method, path, version, status);
        }
        into_hyper(&response)
    }
}

/// Render an envelope response for hyper
#[must_use]
pub fn into_hyper(response: &Response) -> hyper::Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut hyper_response = hyper::Response::new(Full::new(Bytes::from(response.to_body())));
    *hyper_response.status_mut() = status;

    let headers = hyper_response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    for (k, v) in &response.headers {
        match (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %k, "Dropping invalid response header"),
        }
    }
    hyper_response
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{now:x}-{counter:x}")
}
