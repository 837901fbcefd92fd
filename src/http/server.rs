//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router: a catch-all dispatcher plus the optional admin API
//! - Wire up middleware (tracing, request ID)
//! - Translate engine outcomes into status codes
//! - Run blocking handlers off the async runtime
//!
//! # Status Mapping
//! - 404: no route, or an ambiguous match refused by the policy
//! - 400 / 403 / 415: missing header or param / filter rejection / content type
//! - 413: body over `listener.max_body_bytes`; 400 if reading the body fails otherwise
//! - 500: an invocation error nothing handled
//! - 501: an HTTP method the engine does not model

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::schema::{AdminConfig, InvokerConfig};
use crate::http::request::{HttpRequestContext, RequestContext};
use crate::http::response::ResponseBuffer;
use crate::invoker::pipeline::ExecutionPipeline;
use crate::routing::invocation::PreconditionFailure;
use crate::routing::router::RouteRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RouteRegistry>,
    pub pipeline: ExecutionPipeline,
    pub max_body_bytes: usize,
    pub admin: AdminConfig,
}

/// HTTP front end for a `RouteRegistry`.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    pub fn new(
        config: &InvokerConfig,
        registry: Arc<RouteRegistry>,
        pipeline: ExecutionPipeline,
    ) -> Self {
        let state = AppState {
            registry,
            pipeline,
            max_body_bytes: config.listener.max_body_bytes,
            admin: config.admin.clone(),
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let mut router: Router = Router::<AppState>::new()
            .fallback(dispatch)
            .with_state(state.clone());
        if state.admin.enabled {
            router = router.merge(setup_admin_router(state));
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for embedding or `tower::ServiceExt::oneshot`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Status code for a request that resolved but may not run.
pub fn precondition_status(failure: &PreconditionFailure) -> StatusCode {
    match failure {
        PreconditionFailure::MissingHeader(_) | PreconditionFailure::MissingParam(_) => {
            StatusCode::BAD_REQUEST
        }
        PreconditionFailure::RejectedByFilter => StatusCode::FORBIDDEN,
        PreconditionFailure::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
    }
}

/// 413 when the body limit tripped, 400 for any other read failure.
fn body_error_status(err: &axum::Error) -> StatusCode {
    let mut cause = Some(err as &(dyn Error + 'static));
    while let Some(e) = cause {
        if e.is::<LengthLimitError>() {
            return StatusCode::PAYLOAD_TOO_LARGE;
        }
        cause = e.source();
    }
    StatusCode::BAD_REQUEST
}

fn reject(status: StatusCode, message: impl Into<String>) -> Response {
    (status, message.into()).into_response()
}

/// Catch-all handler: resolve, check preconditions, execute.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Failed to read request body");
            let status = body_error_status(&e);
            let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                "request body too large"
            } else {
                "failed to read request body"
            };
            return reject(status, message);
        }
    };

    let context = match HttpRequestContext::from_parts(&parts, body) {
        Ok(context) => context,
        Err(e) => return reject(StatusCode::NOT_IMPLEMENTED, e.to_string()),
    };

    let Some(bound) = state.registry.resolve(context.method(), context.path()) else {
        return reject(StatusCode::NOT_FOUND, "no route matches the request");
    };

    if let Err(failure) = bound.check_preconditions(&context) {
        return reject(precondition_status(&failure), failure.to_string());
    }

    let route = bound.descriptor().key().to_string();
    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut response = ResponseBuffer::new();
        pipeline
            .execute(&bound, &context, &mut response)
            .map(|()| response)
    })
    .await;

    match outcome {
        Ok(Ok(response)) => response.into_response(),
        Ok(Err(e)) => {
            tracing::warn!(route = %route, error = %e, "Invocation returned an error");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
        Err(e) => {
            tracing::error!(route = %route, error = %e, "Handler task panicked");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}
