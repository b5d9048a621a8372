//! Wire types for the feature store and model endpoint

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One named value of a feature store record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureValue {
    /// Feature name
    #[serde(rename = "FeatureName")]
    pub name: String,

    /// Value, always string-encoded by the store
    #[serde(rename = "ValueAsString")]
    pub value: String,
}

impl FeatureValue {
    /// Build a name/value pair
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body of a GetRecord response. An absent record comes back as an empty
/// or missing `Record`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetRecordResponse {
    /// Record fields
    #[serde(rename = "Record", default)]
    pub record: Vec<FeatureValue>,
}

/// All fields stored for one entity, including non-numeric metadata such as
/// event timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Entity the record belongs to
    pub entity: String,

    /// Raw fields in store order
    pub fields: Vec<FeatureValue>,
}

impl EntityRecord {
    /// Raw string value of a field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Raw response of the model endpoint
#[derive(Debug, Clone)]
pub struct PredictionPayload {
    /// Response body, read in full
    pub body: Bytes,

    /// Declared content type, if any
    pub content_type: Option<String>,
}

impl PredictionPayload {
    /// Body as text, lossy for invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }

    /// Structured JSON when the body parses as JSON, the trimmed text
    /// otherwise
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| serde_json::Value::String(self.text()))
    }
}
