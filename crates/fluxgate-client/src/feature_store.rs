//! Online feature store lookups

use crate::error::truncate;
use crate::{
    EntityRecord, Error, FeatureStoreConfig, GetRecordResponse, Result, MAX_STORE_ATTEMPTS,
};
use async_trait::async_trait;
use fluxgate_core::{EntityId, FeatureVector};
use reqwest::{Client, StatusCode};
use std::time::Instant;

/// Resolves an entity identifier to the model's feature vector
#[async_trait]
pub trait FeatureResolver: Send + Sync {
    /// Fetch the configured features for `entity`, in configured order
    async fn fetch_features(&self, entity: &EntityId) -> Result<FeatureVector>;
}

/// Outcome of a single GetRecord attempt
enum Attempt {
    Retryable(String),
    Fatal(Error),
}

/// Feature store client. Owns the retry and backoff policy for lookups.
pub struct FeatureStoreClient {
    client: Client,
    config: FeatureStoreConfig,
}

impl FeatureStoreClient {
    /// Create a client; the HTTP connection pool is shared by all lookups
    pub fn new(config: FeatureStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("fluxgate/0.1")
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    /// Client configuration
    pub fn config(&self) -> &FeatureStoreConfig {
        &self.config
    }

    /// GetRecord URL for the configured feature group
    pub fn record_url(&self) -> String {
        format!(
            "{}/FeatureGroup/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.feature_group
        )
    }

    /// Look up the raw record for an entity.
    ///
    /// Returns `Ok(None)` when the store has no record; that outcome is
    /// never retried. Transport errors, 5xx and 429 are retried up to
    /// `max_attempts` with exponential backoff.
    pub async fn get_record(&self, entity: &EntityId) -> Result<Option<EntityRecord>> {
        let max_attempts = self.config.max_attempts.clamp(1, MAX_STORE_ATTEMPTS);
        let mut delay = self.config.backoff_base;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.try_get_record(entity).await {
                Ok(record) => return Ok(record),
                Err(Attempt::Fatal(err)) => return Err(err),
                Err(Attempt::Retryable(reason)) if attempt < max_attempts => {
                    tracing::warn!(
                        dependency = "feature_store",
                        entity = %entity,
                        attempt,
                        reason = %reason,
                        "Feature store lookup failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(Attempt::Retryable(reason)) => {
                    return Err(Error::StoreUnavailable {
                        attempts: attempt,
                        reason,
                    })
                }
            }
        }
    }

    async fn try_get_record(
        &self,
        entity: &EntityId,
    ) -> std::result::Result<Option<EntityRecord>, Attempt> {
        let resp = self
            .client
            .get(self.record_url())
            .query(&[("RecordIdentifierValueAsString", entity.to_string())])
            .send()
            .await
            .map_err(|e| Attempt::Retryable(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt::Retryable(format!("status {}", status.as_u16())));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| Attempt::Retryable(e.to_string()))?;

        if !status.is_success() {
            return Err(Attempt::Fatal(Error::StoreRejected {
                status: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&body)),
            }));
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let parsed: GetRecordResponse =
            serde_json::from_slice(&body).map_err(|e| Attempt::Fatal(e.into()))?;
        if parsed.record.is_empty() {
            return Ok(None);
        }

        Ok(Some(EntityRecord {
            entity: entity.to_string(),
            fields: parsed.record,
        }))
    }
}

/// Picks `names` out of a record, in order, parsing each as a number.
/// Fields not listed (timestamps, the record identifier) are never parsed.
pub fn project(record: &EntityRecord, names: &[String]) -> Result<FeatureVector> {
    names
        .iter()
        .map(|name| {
            let raw = record.get(name).ok_or_else(|| Error::FeatureNotFound {
                feature: name.clone(),
                entity: record.entity.clone(),
            })?;
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| Error::InvalidFeatureValue {
                    feature: name.clone(),
                    entity: record.entity.clone(),
                    value: raw.to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()
        .map(FeatureVector::new)
}

#[async_trait]
impl FeatureResolver for FeatureStoreClient {
    async fn fetch_features(&self, entity: &EntityId) -> Result<FeatureVector> {
        let start = Instant::now();
        let result = match self.get_record(entity).await {
            Ok(Some(record)) => project(&record, &self.config.feature_names),
            Ok(None) => Err(Error::EntityNotFound(entity.to_string())),
            Err(err) => Err(err),
        };

        let feature_store_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => tracing::info!(
                dependency = "feature_store",
                entity = %entity,
                feature_store_ms,
                "Features resolved"
            ),
            Err(err) => tracing::warn!(
                dependency = "feature_store",
                entity = %entity,
                feature_store_ms,
                error = %err,
                "Feature lookup failed"
            ),
        }
        result
    }
}
