use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered numeric model input. Order must match the model's trained
/// feature order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// A decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Single(FeatureVector),
    Batch(Vec<FeatureVector>),
}

impl Payload {
    /// Expands a single vector into a one-row batch.
    pub fn into_rows(self) -> Vec<FeatureVector> {
        match self {
            Payload::Single(vector) => vec![vector],
            Payload::Batch(rows) => rows,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            Payload::Single(_) => 1,
            Payload::Batch(rows) => rows.len(),
        }
    }
}

/// Model output, one row per input row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predictions {
    rows: Vec<Vec<f64>>,
}

impl Predictions {
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of outputs per row; zero for an empty result.
    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }
}

/// Key of a feature store record. Kept in the JSON form the caller sent so
/// it can be echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{}", id),
            EntityId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Str(id.to_string())
    }
}
