//! Inbound event parsing

use crate::config::RequestMode;
use crate::GatewayError;
use fluxgate_core::codec::{self, JSON};
use fluxgate_core::{CodecError, ContentType, EntityId, FeatureVector, Payload};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const USER_ID: &str = "user_id";

/// One inbound request, independent of how it reached the gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayEvent {
    pub body: String,
    /// Header names are lowercased on insert
    pub headers: BTreeMap<String, String>,
    pub is_base64_encoded: bool,
}

impl GatewayEvent {
    /// Event for a raw HTTP request
    pub fn from_http(body: impl Into<String>, content_type: Option<&str>) -> Self {
        let mut event = Self {
            body: body.into(),
            ..Self::default()
        };
        if let Some(ct) = content_type {
            event = event.with_header("content-type", ct);
        }
        event
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Event for a function-style invocation.
    ///
    /// A proxy envelope carries the request under `body` (a JSON string, or an
    /// inline object) with `headers` and `isBase64Encoded` alongside. Any other
    /// JSON document is the request payload itself.
    pub fn from_invocation(raw: &[u8]) -> Result<Self, GatewayError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|_| GatewayError::BadRequest("invocation payload is not valid JSON".into()))?;

        let envelope = match &value {
            Value::Object(map) if map.contains_key("body") => map,
            _ => {
                return Ok(Self::from_http(value.to_string(), Some(JSON)));
            }
        };

        let body = match envelope.get("body") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let mut event = Self {
            body,
            is_base64_encoded: envelope
                .get("isBase64Encoded")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            ..Self::default()
        };
        if let Some(Value::Object(headers)) = envelope.get("headers") {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    event = event.with_header(name, value);
                }
            }
        }
        Ok(event)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Declared content type, `application/json` when absent
    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or(JSON)
    }
}

/// What the caller asked for
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceRequest {
    Direct(FeatureVector),
    Resolved(EntityId),
}

impl InferenceRequest {
    pub fn mode(&self) -> RequestMode {
        match self {
            InferenceRequest::Direct(_) => RequestMode::Direct,
            InferenceRequest::Resolved(_) => RequestMode::Resolved,
        }
    }

    /// Parse an event body. Media type is checked before anything else so an
    /// unsupported request never reaches a dependency.
    pub fn parse(event: &GatewayEvent) -> Result<Self, GatewayError> {
        let content_type = ContentType::parse(event.content_type()).map_err(codec_error)?;

        if event.is_base64_encoded {
            return Err(GatewayError::BadRequest(
                "base64-encoded bodies are not supported".into(),
            ));
        }
        if event.body.trim().is_empty() {
            return Err(GatewayError::BadRequest("request body is empty".into()));
        }

        match content_type {
            ContentType::Csv => {
                let payload =
                    codec::decode(event.body.as_bytes(), content_type).map_err(codec_error)?;
                single(payload).map(InferenceRequest::Direct)
            }
            ContentType::Json => {
                let value: Value = serde_json::from_str(&event.body)
                    .map_err(|e| GatewayError::BadRequest(format!("invalid JSON: {}", e)))?;
                if let Value::Object(map) = &value {
                    if map.contains_key(USER_ID) {
                        return entity_id(map).map(InferenceRequest::Resolved);
                    }
                }
                let payload = codec::decode_json_value(&value).map_err(codec_error)?;
                single(payload).map(InferenceRequest::Direct)
            }
        }
    }
}

fn entity_id(map: &Map<String, Value>) -> Result<EntityId, GatewayError> {
    match map.get(USER_ID) {
        Some(Value::Null) | None => Err(GatewayError::BadRequest("user_id is required".into())),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(GatewayError::BadRequest("user_id must not be empty".into()))
        }
        Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
            GatewayError::BadRequest("user_id must be an integer or a string".into())
        }),
    }
}

// The gateway predicts one vector per request.
fn single(payload: Payload) -> Result<FeatureVector, GatewayError> {
    let mut rows = payload.into_rows();
    if rows.len() != 1 {
        return Err(GatewayError::BadRequest(format!(
            "expected exactly one feature vector, got {}",
            rows.len()
        )));
    }
    rows.pop()
        .ok_or_else(|| GatewayError::BadRequest("request carries no feature vector".into()))
}

fn codec_error(err: CodecError) -> GatewayError {
    match err {
        CodecError::UnsupportedMediaType(ct) => {
            GatewayError::UnsupportedMediaType(format!("unsupported content type: {}", ct))
        }
        CodecError::MalformedInput(msg) => GatewayError::BadRequest(msg),
        CodecError::Encode(msg) => GatewayError::Internal(msg),
    }
}
