//! Outbound response shape

use crate::GatewayError;
use fluxgate_core::codec::JSON;
use fluxgate_core::{EntityId, FeatureVector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";

/// Successful prediction. `features` and `user_id` are diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub prediction: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<EntityId>,
}

/// `{statusCode, headers, body}` with a JSON string body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl GatewayResponse {
    fn new(status_code: u16, body: String, cors: bool) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), JSON.to_string());
        if cors {
            headers.insert(ALLOW_ORIGIN.to_string(), "*".to_string());
            headers.insert(ALLOW_METHODS.to_string(), "POST, OPTIONS".to_string());
            headers.insert(ALLOW_HEADERS.to_string(), "Content-Type".to_string());
        }
        Self {
            status_code,
            headers,
            body,
        }
    }

    pub fn ok(response: &InferenceResponse, cors: bool) -> Self {
        match serde_json::to_string(response) {
            Ok(body) => Self::new(200, body, cors),
            Err(e) => Self::error(&GatewayError::Internal(e.to_string()), cors),
        }
    }

    pub fn error(err: &GatewayError, cors: bool) -> Self {
        let body = json!({ "error": err.to_string() }).to_string();
        Self::new(err.status_code(), body, cors)
    }

    /// Empty 200 answer to a CORS preflight
    pub fn preflight(cors: bool) -> Self {
        Self::new(200, String::new(), cors)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_body_omits_absent_echo_fields() {
        let resp = InferenceResponse {
            prediction: json!([0.25]),
            features: None,
            user_id: None,
        };
        let out = GatewayResponse::ok(&resp, false);
        assert_eq!(out.status_code, 200);
        assert_eq!(out.body, r#"{"prediction":[0.25]}"#);
        assert_eq!(out.header("content-type"), Some("application/json"));
        assert_eq!(out.header(ALLOW_ORIGIN), None);
    }

    #[test]
    fn test_user_id_echoed_in_original_form() {
        let resp = InferenceResponse {
            prediction: json!(1.5),
            features: Some(vec![1.0, 2.0].into()),
            user_id: Some(EntityId::Int(7)),
        };
        let body = GatewayResponse::ok(&resp, true).json_body().unwrap();
        assert_eq!(body["user_id"], json!(7));
        assert_eq!(body["features"], json!([1.0, 2.0]));
    }

    #[test]
    fn test_error_body_and_cors() {
        let err = GatewayError::NotFound("no features found for user_id 999".into());
        let out = GatewayResponse::error(&err, true);
        assert_eq!(out.status_code, 404);
        assert_eq!(
            out.json_body().unwrap(),
            json!({"error": "no features found for user_id 999"})
        );
        assert_eq!(out.header(ALLOW_ORIGIN), Some("*"));
        assert_eq!(out.header(ALLOW_METHODS), Some("POST, OPTIONS"));
    }

    #[test]
    fn test_serialized_shape() {
        let out = GatewayResponse::preflight(false);
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["statusCode"], json!(200));
        assert_eq!(value["body"], json!(""));
        assert_eq!(value["headers"]["Content-Type"], json!("application/json"));
    }
}
