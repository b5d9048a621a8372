//! Clients for the gateway's two network dependencies: the online feature
//! store and the model-serving endpoint.
//!
//! Both clients hold a pooled `reqwest::Client` and are safe to share across
//! concurrent requests. The feature store client retries transient failures;
//! the endpoint client never retries.

#![warn(missing_docs)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod feature_store;
pub mod types;

pub use config::{default_feature_names, EndpointConfig, FeatureStoreConfig, MAX_STORE_ATTEMPTS};
pub use endpoint::{EndpointClient, PredictionInvoker};
pub use error::{Error, Result};
pub use feature_store::{project, FeatureResolver, FeatureStoreClient};
pub use types::{EntityRecord, FeatureValue, GetRecordResponse, PredictionPayload};
