//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router sending every request to the pipeline
//! - Wire up middleware (request ID, tracing, body limit, timeout)
//! - Collect the request body and run the pipeline on the blocking pool
//! - Bind server to listener and shut down gracefully

use std::io::{self, Cursor};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use bytes::Bytes;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::http::request::{request_id, UuidRequestId};
use crate::http::response::{error_response, into_response, ResponseRecorder};
use crate::observability::{metrics, TracingDiagnostics};
use crate::pipeline::{Application, BoxError, RequestContext, ResponseHead};
use crate::resilience::kinds::RetryableKinds;

/// Failures of the host itself, as opposed to the application.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("application returned without starting a response")]
    NotStarted,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<dyn Application>,
    pub retryable: RetryableKinds,
    pub max_body_size: usize,
}

/// HTTP server running a pipeline application.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server for `app`.
    ///
    /// `retryable` decides which application errors are reported as `409 Conflict`.
    pub fn new(config: ServiceConfig, app: Arc<dyn Application>, retryable: RetryableKinds) -> Self {
        let state = AppState {
            app,
            retryable,
            max_body_size: config.listener.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .fallback(pipeline_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The router, for driving the server without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Runs every request through the pipeline application.
async fn pipeline_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(request.headers());
    let (parts, body) = request.into_parts();

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        path = %parts.uri.path(),
        "Dispatching request"
    );

    let bytes = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_http_response(StatusCode::PAYLOAD_TOO_LARGE.as_u16());
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
    };

    let declared = bytes.len() as u64;
    let ctx = RequestContext::new(parts.method, parts.uri)
        .with_headers(parts.headers)
        .with_body(Cursor::new(bytes), Some(declared))
        .with_diagnostics(TracingDiagnostics::new(request_id.clone()));

    let app = state.app.clone();
    let outcome = tokio::task::spawn_blocking(move || dispatch(app.as_ref(), ctx)).await;

    let response = match outcome {
        Ok(Ok((head, chunks))) => into_response(head, chunks),
        Ok(Err(Failure { error, started })) => {
            let status = if state.retryable.is_retryable(&*error) {
                StatusCode::CONFLICT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::error!(
                request_id = %request_id,
                error = %error,
                response_started = started,
                status = %status,
                "Application failed"
            );
            match status {
                StatusCode::CONFLICT => error_response(status, "Conflict"),
                _ => error_response(status, "Internal Server Error"),
            }
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Pipeline task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    };

    metrics::record_http_response(response.status().as_u16());
    response
}

/// Application error, and whether a response head had been announced before it.
struct Failure {
    error: BoxError,
    started: bool,
}

/// Call `app` and drain its body. Runs on the blocking pool.
fn dispatch(
    app: &dyn Application,
    mut ctx: RequestContext,
) -> Result<(ResponseHead, Vec<Bytes>), Failure> {
    let mut recorder = ResponseRecorder::default();

    let body = match app.call(&mut ctx, &mut recorder) {
        Ok(body) => body,
        Err(error) => {
            return Err(Failure {
                error,
                started: recorder.is_started(),
            })
        }
    };

    let chunks = match body.collect::<io::Result<Vec<Bytes>>>() {
        Ok(chunks) => chunks,
        Err(e) => {
            return Err(Failure {
                error: e.into(),
                started: recorder.is_started(),
            })
        }
    };

    match recorder.into_parts() {
        (Some(head), mut written) => {
            written.extend(chunks);
            Ok((head, written))
        }
        (None, _) => Err(Failure {
            error: HostError::NotStarted.into(),
            started: false,
        }),
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C; shutdown signal disabled");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
