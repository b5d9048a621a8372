//! HTTP surface of the gateway.
//!
//! `/predict` takes the request as-is. `/invoke` takes a function-style event
//! (a proxy envelope or a bare payload) and answers with the
//! `{statusCode, headers, body}` document instead of a plain HTTP response.

use crate::{Gateway, GatewayError, GatewayEvent, GatewayResponse};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_app(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler).options(preflight_handler))
        .route("/invoke", post(invoke_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

async fn preflight_handler(State(gateway): State<Arc<Gateway>>) -> GatewayResponse {
    gateway.preflight()
}

async fn predict_handler(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body = match String::from_utf8(body.to_vec()) {
        Ok(body) => body,
        Err(_) => {
            let err = GatewayError::BadRequest("request body is not valid UTF-8".into());
            return GatewayResponse::error(&err, gateway.config().cors);
        }
    };
    gateway.handle(GatewayEvent::from_http(body, content_type)).await
}

async fn invoke_handler(State(gateway): State<Arc<Gateway>>, body: Bytes) -> Json<GatewayResponse> {
    let response = match GatewayEvent::from_invocation(&body) {
        Ok(event) => gateway.handle(event).await,
        Err(err) => GatewayResponse::error(&err, gateway.config().cors),
    };
    Json(response)
}
