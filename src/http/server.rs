//! HTTP server setup and request lifecycle.
//!
//! # Responsibilities
//! - Own the root router and compile it at start
//! - Wire up middleware (tracing, request ID, timeout)
//! - Accept connections and serve them over HTTP/1.1
//! - Per request: build the body, dispatch, guarantee exactly one response
//! - Confine every per-request failure to that request
//!
//! # Design Decisions
//! - Dispatch is synchronous and runs on the blocking pool, so a slow
//!   handler never stalls the async workers and the timeout layer can still
//!   answer with 408
//! - A response no handler finalized is finalized with its current state
//! - Contract violations before the head is sent become a 500
//! - A panicking handler becomes a 500; the server keeps running

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::{JoinHandle, JoinSet};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::http::{Request, Response};
use crate::lifecycle::{Shutdown, ShutdownListener};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::matcher::normalize_path;
use crate::routing::{Handler, HandlerResult, RequestStatus, RouteTable, Router};

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Errors raised while starting or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The root router bound to a listener.
pub struct Server {
    router: Router,
    config: ServerConfig,
    error_hook: Option<Handler>,
}

impl Server {
    /// Create a server with an empty root router.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            router: Router::new(),
            config,
            error_hook: None,
        }
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.get(pattern, handler);
        self
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.post(pattern, handler);
        self
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.patch(pattern, handler);
        self
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.delete(pattern, handler);
        self
    }

    pub fn any<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.any(pattern, handler);
        self
    }

    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        self.router.mount(prefix, router);
        self
    }

    /// Handler run when dispatch ends with [`RequestStatus::Error`] and the
    /// response is not yet complete. Without it, `Error` behaves like `Done`.
    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(handler));
        self
    }

    /// Compile the routes and build the axum service with all middleware
    /// layers. Usable without a listener (e.g. with `tower::ServiceExt`).
    #[allow(deprecated)]
    pub fn into_app(self) -> axum::Router {
        let request_timeout = Duration::from_secs(self.config.timeouts.request_secs);
        let state = AppState {
            pipeline: Arc::new(Pipeline {
                table: RouteTable::compile(self.router),
                error_hook: self.error_hook,
                check_content_type: self.config.response.check_content_type,
            }),
            max_body_bytes: self.config.limits.max_body_bytes,
        };

        axum::Router::new()
            .fallback(dispatch_request)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener, start accepting connections and call `ready` with
    /// the bound address.
    pub async fn start<F>(self, ready: F) -> Result<ServerHandle, ServerError>
    where
        F: FnOnce(SocketAddr),
    {
        let listener = Listener::bind(&self.config.listener).await?;
        let local_addr = listener.local_addr()?;
        let drain_timeout = Duration::from_secs(self.config.timeouts.shutdown_secs);

        let app = self.into_app();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(accept_loop(listener, app, shutdown.subscribe(), drain_timeout));

        info!(address = %local_addr, "HTTP server started");
        ready(local_addr);

        Ok(ServerHandle {
            local_addr,
            shutdown,
            task,
        })
    }
}

/// A running server.
///
/// Dropping the handle also stops the accept loop, without waiting for it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, let open connections finish and release the listener.
    pub async fn close(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        self.task.await?;
        info!(address = %self.local_addr, "HTTP server stopped");
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    max_body_bytes: usize,
}

/// Synchronous part of the request lifecycle.
struct Pipeline {
    table: RouteTable,
    error_hook: Option<Handler>,
    check_content_type: bool,
}

impl Pipeline {
    fn run(&self, mut request: Request) -> axum::response::Response {
        let mut response = Response::new();
        response.set_content_type_check(self.check_content_type);

        let path = normalize_path(request.path()).into_owned();
        match self.table.dispatch(&path, &mut request, &mut response) {
            Ok(RequestStatus::Error) => self.handle_error_status(&mut request, &mut response),
            Ok(_) => {}
            Err(err) => {
                warn!(
                    request_id = request.id().unwrap_or("unknown"),
                    path = %path,
                    error = %err,
                    "Handler violated the response contract"
                );
                if !response.is_head_sent() {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
                }
            }
        }

        response.into_http()
    }

    fn handle_error_status(&self, request: &mut Request, response: &mut Response) {
        debug!(
            request_id = request.id().unwrap_or("unknown"),
            path = %request.path(),
            "Dispatch ended with error status"
        );
        let Some(hook) = &self.error_hook else {
            return;
        };
        if response.is_complete() {
            return;
        }
        if let Err(err) = hook(request, response) {
            warn!(
                request_id = request.id().unwrap_or("unknown"),
                error = %err,
                "Error handler failed"
            );
        }
    }
}

/// Fallback handler: every request lands here.
async fn dispatch_request(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let mut request = Request::new(request);
    let request_id = request.id().unwrap_or("unknown").to_string();

    debug!(
        request_id = %request_id,
        method = %method,
        path = %request.path(),
        "Dispatching request"
    );

    if let Err(err) = request.build_body(state.max_body_bytes).await {
        warn!(request_id = %request_id, error = %err, "Rejected request body");
        metrics::record_request(&method, StatusCode::BAD_REQUEST.as_u16(), start_time);
        return err.into_response();
    }

    let pipeline = Arc::clone(&state.pipeline);
    let response = match tokio::task::spawn_blocking(move || pipeline.run(request)).await {
        Ok(response) => response,
        Err(err) => {
            error!(request_id = %request_id, error = %err, "Handler panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

async fn accept_loop(
    listener: Listener,
    app: axum::Router,
    mut shutdown: ShutdownListener,
    drain_timeout: Duration,
) {
    let tracker = ConnectionTracker::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr, permit)) => {
                    while connections.try_join_next().is_some() {}
                    connections.spawn(serve_connection(
                        stream,
                        peer_addr,
                        TowerToHyperService::new(app.clone()),
                        permit,
                        tracker.track(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    let slots_in_use = listener.max_connections().saturating_sub(listener.available_permits());
    drop(listener);
    info!(
        active_connections = tracker.active_count(),
        slots_in_use,
        "Listener closed, draining connections"
    );
    if !tracker.wait_for_drain(drain_timeout).await {
        warn!(
            remaining = tracker.active_count(),
            "Drain timeout elapsed, dropping remaining connections"
        );
        connections.abort_all();
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    service: TowerToHyperService<axum::Router>,
    _permit: ConnectionPermit,
    guard: ConnectionGuard,
    mut shutdown: ShutdownListener,
) {
    let connection_id = guard.id();
    debug!(connection_id = %connection_id, peer_addr = %peer_addr, "Serving connection");

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = shutdown.wait() => {
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };

    if let Err(e) = result {
        debug!(connection_id = %connection_id, error = %e, "Connection error");
    }
}
