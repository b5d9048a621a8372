//! Configuration for the feature store and model endpoint clients

use fluxgate_core::ContentType;
use std::time::Duration;

/// Configuration for the online feature store
#[derive(Debug, Clone)]
pub struct FeatureStoreConfig {
    /// Base URL of the feature store runtime API
    pub endpoint: String,

    /// Feature group holding the entity records
    pub feature_group: String,

    /// Numeric features, in the order the model was trained on
    pub feature_names: Vec<String>,

    /// Per-attempt HTTP timeout
    pub timeout: Duration,

    /// Total attempts for transient failures, including the first
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    pub backoff_base: Duration,
}

/// Upper bound on feature store attempts per lookup, including the first
pub const MAX_STORE_ATTEMPTS: u32 = 3;

/// Feature names `f1..=fN`
pub fn default_feature_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("f{}", i)).collect()
}

impl Default for FeatureStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4566".to_string(),
            feature_group: String::new(),
            feature_names: default_feature_names(8),
            timeout: Duration::from_millis(500),
            max_attempts: MAX_STORE_ATTEMPTS,
            backoff_base: Duration::from_millis(25),
        }
    }
}

impl FeatureStoreConfig {
    /// Config for a feature group behind the given endpoint
    pub fn new(endpoint: impl Into<String>, feature_group: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            feature_group: feature_group.into(),
            ..Self::default()
        }
    }

    /// Set the ordered feature names
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the attempt budget, clamped to `1..=MAX_STORE_ATTEMPTS`
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_STORE_ATTEMPTS);
        self
    }

    /// Set the initial retry delay
    pub fn with_backoff_base(mut self, delay: Duration) -> Self {
        self.backoff_base = delay;
        self
    }
}

/// Configuration for the model-serving endpoint
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL of the serving runtime API
    pub endpoint: String,

    /// Name the endpoint is addressed by
    pub endpoint_name: String,

    /// Hard limit for one invocation; there are no retries
    pub timeout: Duration,

    /// Wire format used for outbound feature vectors
    pub content_type: ContentType,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            endpoint_name: String::new(),
            timeout: Duration::from_secs(2),
            content_type: ContentType::Csv,
        }
    }
}

impl EndpointConfig {
    /// Config for a named endpoint behind the given base URL
    pub fn new(endpoint: impl Into<String>, endpoint_name: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            endpoint_name: endpoint_name.into(),
            ..Self::default()
        }
    }

    /// Set the invocation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the outbound content type
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Full invocation URL
    pub fn invocation_url(&self) -> String {
        format!(
            "{}/endpoints/{}/invocations",
            self.endpoint.trim_end_matches('/'),
            self.endpoint_name
        )
    }
}
