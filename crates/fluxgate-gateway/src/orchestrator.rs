//! Request lifecycle: parse, resolve features, invoke, respond.

use crate::config::{GatewayConfig, RequestMode};
use crate::request::{GatewayEvent, InferenceRequest};
use crate::response::{GatewayResponse, InferenceResponse};
use crate::GatewayError;
use fluxgate_client::{
    EndpointClient, Error as ClientError, FeatureResolver, FeatureStoreClient, PredictionInvoker,
};
use fluxgate_core::{EntityId, FeatureVector};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ParsingRequest,
    ResolvingFeatures,
    Invoking,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ParsingRequest => "parsing_request",
            Stage::ResolvingFeatures => "resolving_features",
            Stage::Invoking => "invoking",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

pub struct Gateway {
    config: GatewayConfig,
    resolver: Option<Arc<dyn FeatureResolver>>,
    invoker: Arc<dyn PredictionInvoker>,
    requests: AtomicU64,
}

impl Gateway {
    pub fn new(config: GatewayConfig, invoker: Arc<dyn PredictionInvoker>) -> Self {
        Self {
            config,
            resolver: None,
            invoker,
            requests: AtomicU64::new(0),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn FeatureResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Build the HTTP clients the config describes
    pub fn from_config(config: GatewayConfig) -> fluxgate_client::Result<Self> {
        let invoker = Arc::new(EndpointClient::new(config.endpoint.clone())?);
        let resolver = match &config.feature_store {
            Some(store) => {
                let client = FeatureStoreClient::new(store.clone())?;
                Some(Arc::new(client) as Arc<dyn FeatureResolver>)
            }
            None => None,
        };

        let mut gateway = Self::new(config, invoker);
        gateway.resolver = resolver;
        Ok(gateway)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Requests handled since startup
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Run one request to a terminal response. Never fails; errors become
    /// status codes.
    pub async fn handle(&self, event: GatewayEvent) -> GatewayResponse {
        let request_id = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let start = Instant::now();

        let result = self.process(&event).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response) => {
                tracing::info!(request_id, status = 200u16, elapsed_ms, "Request completed");
                GatewayResponse::ok(&response, self.config.cors)
            }
            Err((stage, err)) => {
                tracing::warn!(
                    request_id,
                    stage = %stage,
                    status = err.status_code(),
                    kind = err.kind(),
                    elapsed_ms,
                    error = %err,
                    "Request failed"
                );
                GatewayResponse::error(&err, self.config.cors)
            }
        }
    }

    pub fn preflight(&self) -> GatewayResponse {
        GatewayResponse::preflight(self.config.cors)
    }

    async fn process(
        &self,
        event: &GatewayEvent,
    ) -> Result<InferenceResponse, (Stage, GatewayError)> {
        let mut stage = Stage::ParsingRequest;
        tracing::debug!(stage = %stage, content_type = event.content_type(), "Stage entered");

        let request = InferenceRequest::parse(event).map_err(|e| (stage, e))?;
        if request.mode() != self.config.mode {
            return Err((stage, wrong_mode(self.config.mode)));
        }

        let (features, user_id) = match request {
            InferenceRequest::Direct(features) => (features, None),
            InferenceRequest::Resolved(entity) => {
                stage = Stage::ResolvingFeatures;
                tracing::debug!(stage = %stage, entity = %entity, "Stage entered");
                let features = self.resolve(&entity).await.map_err(|e| (stage, e))?;
                (features, Some(entity))
            }
        };

        if features.len() != self.config.arity {
            return Err((
                stage,
                GatewayError::BadRequest(format!(
                    "expected {} features, got {}",
                    self.config.arity,
                    features.len()
                )),
            ));
        }

        if features.values().iter().any(|v| !v.is_finite()) {
            let err = match user_id {
                Some(_) => GatewayError::Internal("stored features could not be read".into()),
                None => GatewayError::BadRequest("features must be finite numbers".into()),
            };
            return Err((stage, err));
        }

        stage = Stage::Invoking;
        tracing::debug!(
            stage = %stage,
            endpoint = %self.config.endpoint.endpoint_name,
            "Stage entered"
        );
        let prediction = self.invoke(&features).await.map_err(|e| (stage, e))?;

        stage = Stage::Responding;
        tracing::debug!(stage = %stage, "Stage entered");
        Ok(InferenceResponse {
            prediction,
            features: Some(features),
            user_id,
        })
    }

    async fn resolve(&self, entity: &EntityId) -> Result<FeatureVector, GatewayError> {
        let resolver = self.resolver.as_ref().ok_or_else(|| {
            tracing::error!("Resolved request but no feature resolver is configured");
            GatewayError::Internal("feature resolution is not configured".into())
        })?;

        resolver.fetch_features(entity).await.map_err(|err| {
            tracing::warn!(
                dependency = "feature_store",
                entity = %entity,
                error = %err,
                "Feature resolution failed"
            );
            resolve_error(entity, err)
        })
    }

    async fn invoke(&self, features: &FeatureVector) -> Result<Value, GatewayError> {
        let unavailable =
            || GatewayError::InferenceUnavailable("model endpoint unavailable".into());

        let payload = self
            .invoker
            .invoke(features, self.config.endpoint.content_type)
            .await
            .map_err(|err| {
                tracing::warn!(
                    dependency = "endpoint",
                    endpoint = %self.config.endpoint.endpoint_name,
                    error = %err,
                    "Invocation failed"
                );
                unavailable()
            })?;

        let prediction = payload.to_json_value();
        let empty = match &prediction {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        };
        if empty {
            tracing::warn!(dependency = "endpoint", "Endpoint returned an empty prediction");
            return Err(unavailable());
        }
        Ok(prediction)
    }
}

fn wrong_mode(mode: RequestMode) -> GatewayError {
    match mode {
        RequestMode::Direct => GatewayError::BadRequest("features is required".into()),
        RequestMode::Resolved => GatewayError::BadRequest("user_id is required".into()),
    }
}

fn resolve_error(entity: &EntityId, err: ClientError) -> GatewayError {
    match err {
        ClientError::EntityNotFound(_) => {
            GatewayError::NotFound(format!("no features found for user_id {}", entity))
        }
        ClientError::FeatureNotFound { feature, .. } => GatewayError::NotFound(format!(
            "feature '{}' not found for user_id {}",
            feature, entity
        )),
        ClientError::InvalidFeatureValue { .. } => {
            GatewayError::Internal("stored features could not be read".into())
        }
        _ => GatewayError::DependencyUnavailable("feature store unavailable".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use fluxgate_client::{EndpointConfig, FeatureStoreConfig, PredictionPayload};
    use fluxgate_core::ContentType;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StaticResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FeatureResolver for StaticResolver {
        async fn fetch_features(
            &self,
            entity: &EntityId,
        ) -> fluxgate_client::Result<FeatureVector> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match entity {
                EntityId::Int(7) => Ok(vec![1.0; 8].into()),
                EntityId::Int(8) => Err(ClientError::FeatureNotFound {
                    feature: "f3".into(),
                    entity: "8".into(),
                }),
                EntityId::Int(9) => Err(ClientError::StoreUnavailable {
                    attempts: 3,
                    reason: "connection refused".into(),
                }),
                EntityId::Int(10) => Ok(vec![1.0; 3].into()),
                EntityId::Int(11) => Ok(vec![1.0, f64::NAN, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0].into()),
                other => Err(ClientError::EntityNotFound(other.to_string())),
            }
        }
    }

    struct RecordingInvoker {
        reply: Option<&'static str>,
        seen: Mutex<Vec<(FeatureVector, ContentType)>>,
    }

    impl RecordingInvoker {
        fn replying(reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PredictionInvoker for RecordingInvoker {
        async fn invoke(
            &self,
            vector: &FeatureVector,
            content_type: ContentType,
        ) -> fluxgate_client::Result<PredictionPayload> {
            self.seen.lock().unwrap().push((vector.clone(), content_type));
            match self.reply {
                Some(body) => Ok(PredictionPayload {
                    body: Bytes::from_static(body.as_bytes()),
                    content_type: Some("application/json".into()),
                }),
                None => Err(ClientError::EndpointTimeout(Duration::from_secs(2))),
            }
        }
    }

    fn endpoint() -> EndpointConfig {
        EndpointConfig::new("http://runtime", "churn")
    }

    fn store() -> FeatureStoreConfig {
        FeatureStoreConfig::new("http://store", "users")
    }

    fn direct(invoker: Arc<RecordingInvoker>) -> Gateway {
        Gateway::new(GatewayConfig::direct(endpoint()), invoker)
    }

    fn resolved(invoker: Arc<RecordingInvoker>) -> (Gateway, Arc<StaticResolver>) {
        let resolver = Arc::new(StaticResolver {
            calls: AtomicUsize::new(0),
        });
        let config = GatewayConfig::resolved(endpoint(), store());
        let gateway = Gateway::new(config, invoker).with_resolver(resolver.clone());
        (gateway, resolver)
    }

    fn json_event(body: &str) -> GatewayEvent {
        GatewayEvent::from_http(body, Some("application/json"))
    }

    #[tokio::test]
    async fn test_direct_success_echoes_features() {
        let invoker = RecordingInvoker::replying(Some("[0.73]"));
        let gateway = direct(invoker.clone());

        let resp = gateway
            .handle(json_event(r#"{"features":[0.5,-1.2,3.3,0.0,2.1,-0.7,4.4,5.5]}"#))
            .await;
        assert_eq!(resp.status_code, 200);
        let body = resp.json_body().unwrap();
        assert_eq!(body["prediction"], json!([0.73]));
        assert_eq!(body["features"], json!([0.5, -1.2, 3.3, 0.0, 2.1, -0.7, 4.4, 5.5]));
        assert!(body.get("user_id").is_none());

        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, ContentType::Csv);
        assert_eq!(gateway.request_count(), 1);
    }

    #[tokio::test]
    async fn test_arity_checked_before_invocation() {
        let invoker = RecordingInvoker::replying(Some("[0.73]"));
        let gateway = direct(invoker.clone());

        let resp = gateway.handle(json_event(r#"{"features":[1,2,3]}"#)).await;
        assert_eq!(resp.status_code, 400);
        assert_eq!(
            resp.json_body().unwrap(),
            json!({"error": "expected 8 features, got 3"})
        );
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_finite_features_never_invoked() {
        let invoker = RecordingInvoker::replying(Some("[0.73]"));
        let resp = direct(invoker.clone())
            .handle(GatewayEvent::from_http("nan,1,1,1,1,1,1,1", Some("text/csv")))
            .await;
        assert_eq!(resp.status_code, 400);

        let resp = direct(invoker.clone())
            .handle(GatewayEvent::from_http("1,1,1,inf,1,1,1,1", Some("text/csv")))
            .await;
        assert_eq!(resp.status_code, 400);

        let (gateway, _) = resolved(invoker.clone());
        let resp = gateway.handle(json_event(r#"{"user_id":11}"#)).await;
        assert_eq!(resp.status_code, 500);

        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test]
    async fn test_wrong_mode_is_bad_request() {
        let invoker = RecordingInvoker::replying(Some("[0.73]"));
        let resp = direct(invoker.clone()).handle(json_event(r#"{"user_id":7}"#)).await;
        assert_eq!(resp.status_code, 400);

        let (gateway, resolver) = resolved(invoker.clone());
        let resp = gateway.handle(json_event(r#"{"features":[1,1,1,1,1,1,1,1]}"#)).await;
        assert_eq!(resp.status_code, 400);
        assert_eq!(resp.json_body().unwrap()["error"], json!("user_id is required"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolved_success_echoes_user_id() {
        let invoker = RecordingInvoker::replying(Some("0.42"));
        let (gateway, _) = resolved(invoker.clone());

        let resp = gateway.handle(json_event(r#"{"user_id":7}"#)).await;
        assert_eq!(resp.status_code, 200);
        let body = resp.json_body().unwrap();
        assert_eq!(body["user_id"], json!(7));
        assert_eq!(body["prediction"], json!(0.42));
        assert_eq!(invoker.seen.lock().unwrap()[0].0, FeatureVector::from(vec![1.0; 8]));
    }

    #[tokio::test]
    async fn test_resolver_outcomes_map_to_statuses() {
        let invoker = RecordingInvoker::replying(Some("[1.0]"));
        let (gateway, _) = resolved(invoker.clone());

        let resp = gateway.handle(json_event(r#"{"user_id":999}"#)).await;
        assert_eq!(resp.status_code, 404);
        assert_eq!(
            resp.json_body().unwrap()["error"],
            json!("no features found for user_id 999")
        );

        let resp = gateway.handle(json_event(r#"{"user_id":8}"#)).await;
        assert_eq!(resp.status_code, 404);

        let resp = gateway.handle(json_event(r#"{"user_id":9}"#)).await;
        assert_eq!(resp.status_code, 503);
        assert_eq!(
            resp.json_body().unwrap()["error"],
            json!("feature store unavailable")
        );

        let resp = gateway.handle(json_event(r#"{"user_id":10}"#)).await;
        assert_eq!(resp.status_code, 400);

        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test]
    async fn test_invocation_failure_is_inference_unavailable() {
        let invoker = RecordingInvoker::replying(None);
        let gateway = direct(invoker.clone());

        let resp = gateway.handle(json_event(r#"{"features":[1,1,1,1,1,1,1,1]}"#)).await;
        assert_eq!(resp.status_code, 503);
        let error = resp.json_body().unwrap()["error"].as_str().unwrap().to_string();
        assert_eq!(error, "model endpoint unavailable");
        assert!(!error.contains("timed out"));
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_prediction_is_inference_unavailable() {
        for reply in ["", "[]", "  "] {
            let invoker = RecordingInvoker::replying(Some(reply));
            let resp = direct(invoker)
                .handle(json_event(r#"{"features":[1,1,1,1,1,1,1,1]}"#))
                .await;
            assert_eq!(resp.status_code, 503, "{:?}", reply);
        }
    }

    #[tokio::test]
    async fn test_text_prediction_passed_through() {
        let invoker = RecordingInvoker::replying(Some("0.5\n"));
        let resp = direct(invoker)
            .handle(GatewayEvent::from_http("1,1,1,1,1,1,1,1", Some("text/csv")))
            .await;
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.json_body().unwrap()["prediction"], json!(0.5));

        let invoker = RecordingInvoker::replying(Some("low risk"));
        let resp = direct(invoker)
            .handle(json_event(r#"{"features":[1,1,1,1,1,1,1,1]}"#))
            .await;
        assert_eq!(resp.json_body().unwrap()["prediction"], json!("low risk"));
    }

    #[tokio::test]
    async fn test_unsupported_media_type_touches_nothing() {
        let invoker = RecordingInvoker::replying(Some("[1.0]"));
        let (gateway, resolver) = resolved(invoker.clone());

        let resp = gateway
            .handle(GatewayEvent::from_http("<user_id>7</user_id>", Some("application/xml")))
            .await;
        assert_eq!(resp.status_code, 415);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolved_without_resolver_is_internal() {
        let invoker = RecordingInvoker::replying(Some("[1.0]"));
        let config = GatewayConfig::resolved(endpoint(), store());
        let gateway = Gateway::new(config, invoker);

        let resp = gateway.handle(json_event(r#"{"user_id":7}"#)).await;
        assert_eq!(resp.status_code, 500);
    }

    #[tokio::test]
    async fn test_cors_headers_follow_config() {
        let invoker = RecordingInvoker::replying(Some("[1.0]"));
        let gateway = Gateway::new(GatewayConfig::direct(endpoint()).with_cors(false), invoker);
        let resp = gateway.handle(json_event(r#"{"features":[1,1,1,1,1,1,1,1]}"#)).await;
        assert_eq!(resp.header("Access-Control-Allow-Origin"), None);

        let preflight = direct(RecordingInvoker::replying(None)).preflight();
        assert_eq!(preflight.status_code, 200);
        assert_eq!(preflight.header("Access-Control-Allow-Methods"), Some("POST, OPTIONS"));
    }
}
