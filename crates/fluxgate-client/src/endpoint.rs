//! Model endpoint invocation

use crate::error::truncate;
use crate::{EndpointConfig, Error, PredictionPayload, Result};
use async_trait::async_trait;
use fluxgate_core::{codec, ContentType, FeatureVector};
use reqwest::{header, Client};
use std::time::Instant;

/// Sends a feature vector to a model-serving endpoint
#[async_trait]
pub trait PredictionInvoker: Send + Sync {
    /// Invoke the model once; implementations must not retry
    async fn invoke(
        &self,
        vector: &FeatureVector,
        content_type: ContentType,
    ) -> Result<PredictionPayload>;
}

/// HTTP client for a name-addressed serving endpoint.
///
/// Each invocation is a single attempt bounded by `EndpointConfig::timeout`.
/// A resent inference request would only add tail latency, so failures
/// surface to the caller immediately.
pub struct EndpointClient {
    client: Client,
    config: EndpointConfig,
    url: String,
}

impl EndpointClient {
    /// Create a client for the configured endpoint
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("fluxgate/0.1")
            .timeout(config.timeout)
            .build()?;
        let url = config.invocation_url();

        Ok(Self { client, config, url })
    }

    /// Client configuration
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Invoke using the configured content type
    pub async fn predict(&self, vector: &FeatureVector) -> Result<PredictionPayload> {
        self.invoke(vector, self.config.content_type).await
    }

    async fn send(&self, body: Vec<u8>, content_type: ContentType) -> Result<PredictionPayload> {
        let resp = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, content_type.as_str())
            .header(header::ACCEPT, codec::JSON)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        let response_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(Error::EndpointStatus {
                status: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&bytes)),
            });
        }
        Ok(PredictionPayload {
            body: bytes,
            content_type: response_type,
        })
    }

    fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::EndpointTimeout(self.config.timeout)
        } else {
            Error::Network(err)
        }
    }
}

#[async_trait]
impl PredictionInvoker for EndpointClient {
    async fn invoke(
        &self,
        vector: &FeatureVector,
        content_type: ContentType,
    ) -> Result<PredictionPayload> {
        let body = codec::encode_request(vector, content_type)?;

        let start = Instant::now();
        let result = self.send(body, content_type).await;

        let endpoint_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(payload) => tracing::info!(
                dependency = "model_endpoint",
                endpoint = %self.config.endpoint_name,
                endpoint_ms,
                bytes = payload.body.len(),
                "Endpoint invoked"
            ),
            Err(err) => tracing::warn!(
                dependency = "model_endpoint",
                endpoint = %self.config.endpoint_name,
                endpoint_ms,
                error = %err,
                "Endpoint invocation failed"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_url() {
        let config = EndpointConfig::new("http://runtime:8080/", "churn");
        let client = EndpointClient::new(config).unwrap();
        assert_eq!(client.url, "http://runtime:8080/endpoints/churn/invocations");
    }
}
