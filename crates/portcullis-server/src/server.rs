//! Hyper host adapter.
//!
//! Each request's body is collected, up to `server.max_body_size` bytes,
//! then the router runs on Tokio's
//! blocking pool so handlers are free to block. If hyper drops the request
//! future because the client went away, a guard flips the request's
//! connection-closed flag and the pipeline stops at its next step.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use portcullis::Router;
use portcullis_core::{ConnectionState, Response};
use portcullis_middleware::recovery::fallback_response;
use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Serves a [`Router`] over HTTP/1.1.
///
/// ```rust,ignore
/// let server = Server::bind(router).await?;
/// server.run().await?;
/// ```
pub struct Server {
    shared: Arc<Shared>,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown_timeout: Duration,
}

struct Shared {
    router: Arc<Router>,
    metrics_path: Option<String>,
    max_body_size: usize,
}

impl Server {
    /// Binds `server.http_addr` from the router's settings.
    ///
    /// # Errors
    ///
    /// Fails if the address is malformed or cannot be bound.
    pub async fn bind(router: Router) -> Result<Self, ServerError> {
        let settings = Arc::clone(router.settings());
        let configured = &settings.server.http_addr;
        let addr: SocketAddr = configured
            .parse()
            .map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
                addr: configured.clone(),
                reason: e.to_string(),
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let metrics_path = settings
            .metrics
            .enabled
            .then(|| settings.metrics.path.clone());

        Ok(Self {
            shared: Arc::new(Shared {
                router: Arc::new(router),
                metrics_path,
                max_body_size: settings.server.max_body_size,
            }),
            listener,
            local_addr,
            shutdown_timeout: Duration::from_secs(settings.server.shutdown_timeout_secs),
        })
    }

    /// Returns the bound address; useful after binding port 0.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// See [`Server::run_with_shutdown`].
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Serves until `shutdown` triggers, then drains open connections.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept failures are logged and retried.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr, routes = self.shared.router.len(), "server listening");
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let token = tracker.acquire();
                        let shared = Arc::clone(&self.shared);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            serve_connection(shared, stream, remote, shutdown).await;
                            drop(token);
                        });
                    }
                    Err(err) => tracing::warn!(error = %err, "accept failed"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown requested, no longer accepting");
                    break;
                }
            }
        }

        tracing::info!(
            open = tracker.active_connections(),
            timeout_secs = self.shutdown_timeout.as_secs(),
            "draining connections"
        );
        if tokio::time::timeout(self.shutdown_timeout, tracker.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                open = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            );
        }

        tracing::info!("server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("metrics_path", &self.shared.metrics_path)
            .finish_non_exhaustive()
    }
}

async fn serve_connection(
    shared: Arc<Shared>,
    stream: TcpStream,
    remote: SocketAddr,
    shutdown: ShutdownSignal,
) {
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let shared = Arc::clone(&shared);
        async move { Ok::<_, Infallible>(shared.handle(request).await) }
    });

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(err) = result {
                tracing::debug!(%remote, error = %err, "connection ended with error");
            }
        }
        () = shutdown.recv() => {
            // Let the in-flight response finish, then close.
            connection.as_mut().graceful_shutdown();
            if let Err(err) = connection.await {
                tracing::debug!(%remote, error = %err, "connection ended during shutdown");
            }
        }
    }
}

impl Shared {
    async fn handle(&self, request: hyper::Request<Incoming>) -> Response {
        if let Some(path) = &self.metrics_path {
            if request.method() == Method::GET && request.uri().path() == path {
                if let Some(body) = portcullis_telemetry::render_metrics() {
                    return metrics_response(body);
                }
            }
        }

        let (parts, body) = request.into_parts();
        let body = match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.is::<LengthLimitError>() => {
                tracing::debug!(limit = self.max_body_size, path = parts.uri.path(), "request body too large");
                return plain(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
            }
            Err(err) => {
                tracing::debug!(error = %err, "request body not received");
                return plain(StatusCode::BAD_REQUEST, "Bad Request");
            }
        };
        let request = http::Request::from_parts(parts, body);

        let connection = ConnectionState::new();
        let guard = DisconnectGuard::arm(connection.clone());
        let router = Arc::clone(&self.router);
        let result = tokio::task::spawn_blocking(move || router.serve(request, connection)).await;
        guard.disarm();

        result.unwrap_or_else(|err| {
            tracing::error!(error = %err, "request worker failed");
            fallback_response()
        })
    }
}

/// Closes the connection state if dropped while armed.
struct DisconnectGuard {
    connection: Option<ConnectionState>,
}

impl DisconnectGuard {
    fn arm(connection: ConnectionState) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    fn disarm(mut self) {
        self.connection = None;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::debug!("client disconnected before the response was ready");
            connection.close();
        }
    }
}

fn metrics_response(body: String) -> Response {
    let mut response = http::Response::new(Full::new(Bytes::from(body)));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

fn plain(status: StatusCode, text: &'static str) -> Response {
    let mut response = http::Response::new(Full::new(Bytes::from_static(text.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
