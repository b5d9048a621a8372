//! Process configuration, read once at startup.

use fluxgate_client::{
    default_feature_names, EndpointConfig, FeatureStoreConfig, MAX_STORE_ATTEMPTS,
};
use fluxgate_core::ContentType;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const ENDPOINT_NAME: &str = "FLUXGATE_ENDPOINT_NAME";
pub const ENDPOINT_URL: &str = "FLUXGATE_ENDPOINT_URL";
pub const ENDPOINT_CONTENT_TYPE: &str = "FLUXGATE_ENDPOINT_CONTENT_TYPE";
pub const ENDPOINT_TIMEOUT_MS: &str = "FLUXGATE_ENDPOINT_TIMEOUT_MS";
pub const REQUEST_MODE: &str = "FLUXGATE_REQUEST_MODE";
pub const FEATURE_ARITY: &str = "FLUXGATE_FEATURE_ARITY";
pub const FEATURE_GROUP: &str = "FLUXGATE_FEATURE_GROUP";
pub const FEATURE_STORE_URL: &str = "FLUXGATE_FEATURE_STORE_URL";
pub const FEATURE_NAMES: &str = "FLUXGATE_FEATURE_NAMES";
pub const FEATURE_STORE_TIMEOUT_MS: &str = "FLUXGATE_FEATURE_STORE_TIMEOUT_MS";
pub const FEATURE_STORE_MAX_ATTEMPTS: &str = "FLUXGATE_FEATURE_STORE_MAX_ATTEMPTS";
pub const CORS: &str = "FLUXGATE_CORS";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the feature vector comes from. A deployment serves exactly one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Caller sends `{"features": [...]}` (or CSV)
    #[default]
    Direct,
    /// Caller sends `{"user_id": ...}` and features come from the store
    Resolved,
}

impl FromStr for RequestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(RequestMode::Direct),
            "resolved" => Ok(RequestMode::Resolved),
            other => Err(format!("expected 'direct' or 'resolved', got '{}'", other)),
        }
    }
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMode::Direct => f.write_str("direct"),
            RequestMode::Resolved => f.write_str("resolved"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub mode: RequestMode,
    /// Expected feature vector length
    pub arity: usize,
    pub endpoint: EndpointConfig,
    /// Present only in resolved mode
    pub feature_store: Option<FeatureStoreConfig>,
    /// Attach CORS headers to every response
    pub cors: bool,
}

impl GatewayConfig {
    pub fn direct(endpoint: EndpointConfig) -> Self {
        Self {
            mode: RequestMode::Direct,
            arity: 8,
            endpoint,
            feature_store: None,
            cors: true,
        }
    }

    pub fn resolved(endpoint: EndpointConfig, feature_store: FeatureStoreConfig) -> Self {
        Self {
            mode: RequestMode::Resolved,
            arity: feature_store.feature_names.len(),
            endpoint,
            feature_store: Some(feature_store),
            cors: true,
        }
    }

    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    pub fn with_cors(mut self, cors: bool) -> Self {
        self.cors = cors;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from a variable lookup. Required values missing
    /// from the lookup fail immediately; nothing is retried.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let mode = match get(REQUEST_MODE) {
            Some(raw) => parse(REQUEST_MODE, &raw)?,
            None => RequestMode::Direct,
        };

        let mut endpoint = EndpointConfig::new(require(ENDPOINT_URL)?, require(ENDPOINT_NAME)?);
        if let Some(raw) = get(ENDPOINT_CONTENT_TYPE) {
            let content_type = ContentType::parse(&raw)
                .map_err(|e| invalid(ENDPOINT_CONTENT_TYPE, &raw, e))?;
            endpoint = endpoint.with_content_type(content_type);
        }
        if let Some(raw) = get(ENDPOINT_TIMEOUT_MS) {
            endpoint = endpoint.with_timeout(millis(ENDPOINT_TIMEOUT_MS, &raw)?);
        }

        let arity = match get(FEATURE_ARITY) {
            Some(raw) => parse::<usize>(FEATURE_ARITY, &raw)?,
            None => 8,
        };
        if arity == 0 {
            return Err(invalid(FEATURE_ARITY, "0", "must be positive"));
        }

        let feature_store = match mode {
            RequestMode::Direct => None,
            RequestMode::Resolved => {
                let names = match get(FEATURE_NAMES) {
                    Some(raw) => raw
                        .split(',')
                        .map(|name| name.trim().to_string())
                        .filter(|name| !name.is_empty())
                        .collect(),
                    None => default_feature_names(arity),
                };
                if names.len() != arity {
                    let raw = names.join(",");
                    return Err(invalid(
                        FEATURE_NAMES,
                        &raw,
                        format!("{} names for arity {}", names.len(), arity),
                    ));
                }

                let store_url = require(FEATURE_STORE_URL)?;
                let mut store = FeatureStoreConfig::new(store_url, require(FEATURE_GROUP)?)
                    .with_feature_names(names);
                if let Some(raw) = get(FEATURE_STORE_TIMEOUT_MS) {
                    store = store.with_timeout(millis(FEATURE_STORE_TIMEOUT_MS, &raw)?);
                }
                if let Some(raw) = get(FEATURE_STORE_MAX_ATTEMPTS) {
                    let attempts = parse::<u32>(FEATURE_STORE_MAX_ATTEMPTS, &raw)?;
                    if attempts == 0 || attempts > MAX_STORE_ATTEMPTS {
                        return Err(invalid(
                            FEATURE_STORE_MAX_ATTEMPTS,
                            &raw,
                            format!("must be between 1 and {}", MAX_STORE_ATTEMPTS),
                        ));
                    }
                    store = store.with_max_attempts(attempts);
                }
                Some(store)
            }
        };

        let cors = match get(CORS) {
            Some(raw) => parse::<bool>(CORS, &raw)?,
            None => true,
        };

        Ok(Self {
            mode,
            arity,
            endpoint,
            feature_store,
            cors,
        })
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.parse::<T>().map_err(|e| invalid(var, raw, e))
}

fn millis(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let ms = parse::<u64>(var, raw)?;
    if ms == 0 {
        return Err(invalid(var, raw, "must be positive"));
    }
    Ok(Duration::from_millis(ms))
}
