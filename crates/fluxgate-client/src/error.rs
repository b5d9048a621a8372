//! Error types for fluxgate-client

use std::time::Duration;

/// Error type for feature store and model endpoint calls
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport error that is not retried
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The store holds no record for the entity
    #[error("No record found for entity {0}")]
    EntityNotFound(String),

    /// The record exists but lacks a configured feature
    #[error("Feature '{feature}' not found for entity {entity}")]
    FeatureNotFound {
        /// Missing feature name
        feature: String,
        /// Entity whose record was looked up
        entity: String,
    },

    /// A configured feature holds a value that is not a number
    #[error("Feature '{feature}' for entity {entity} is not numeric: {value}")]
    InvalidFeatureValue {
        /// Feature name
        feature: String,
        /// Entity whose record was looked up
        entity: String,
        /// Raw value as stored
        value: String,
    },

    /// Transient store failures outlasted the retry budget
    #[error("Feature store unavailable after {attempts} attempts: {reason}")]
    StoreUnavailable {
        /// Attempts made, including the first
        attempts: u32,
        /// Last failure seen
        reason: String,
    },

    /// The store refused the request with a non-retryable status
    #[error("Feature store rejected request with status {status}: {body}")]
    StoreRejected {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The model endpoint answered with a non-success status
    #[error("Model endpoint returned status {status}: {body}")]
    EndpointStatus {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The model endpoint did not answer within its budget
    #[error("Model endpoint timed out after {0:?}")]
    EndpointTimeout(Duration),

    /// Payload could not be encoded for the endpoint
    #[error("Codec error: {0}")]
    Codec(#[from] fluxgate_core::CodecError),

    /// Response body did not match the expected schema
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for outcomes the caller can correct (unknown entity or feature)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::EntityNotFound(_) | Error::FeatureNotFound { .. })
    }
}

/// Result type for fluxgate-client operations
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn truncate(body: &str) -> String {
    const LIMIT: usize = 256;
    if body.len() <= LIMIT {
        return body.to_string();
    }
    let mut end = LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
