//! HTTP surface of the serving container: `/ping` and `/invocations`.

use crate::{Error, ServingRuntime};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_app(runtime: Arc<ServingRuntime>) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/invocations", post(invocations_handler))
        .route("/endpoints/:name/invocations", post(named_invocations_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(runtime)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Invocation failed");
        } else {
            tracing::warn!(error = %self, "Invocation rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

async fn ping_handler(State(runtime): State<Arc<ServingRuntime>>) -> Response {
    match runtime.load().await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn invocations_handler(
    State(runtime): State<Arc<ServingRuntime>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    invoke(&runtime, &headers, &body).await
}

async fn named_invocations_handler(
    State(runtime): State<Arc<ServingRuntime>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    if name != runtime.config().endpoint_name {
        return Err(Error::UnknownEndpoint(name));
    }
    invoke(&runtime, &headers, &body).await
}

async fn invoke(
    runtime: &ServingRuntime,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, Error> {
    let content_type = header_str(headers, header::CONTENT_TYPE).unwrap_or_default();
    let accept = header_str(headers, header::ACCEPT);
    let (body, content_type) = runtime.invoke(body, content_type, accept).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
