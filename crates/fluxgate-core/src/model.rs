use crate::{FeatureVector, ModelError, Payload, Predictions};
use std::collections::HashMap;

pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    /// Number of features each input row must carry.
    fn input_dim(&self) -> usize;

    /// Runs the model on rows already checked against `input_dim`.
    fn forward(&self, rows: &[FeatureVector]) -> Result<Predictions, ModelError>;

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata::default()
    }

    /// Expands a single vector to a one-row batch, rejects misshaped input,
    /// then forwards.
    fn predict(&self, payload: Payload) -> Result<Predictions, ModelError> {
        let rows = payload.into_rows();
        if rows.is_empty() {
            return Err(ModelError::EmptyBatch);
        }
        let expected = self.input_dim();
        if let Some(bad) = rows.iter().find(|row| row.len() != expected) {
            return Err(ModelError::Shape {
                expected,
                got: bad.len(),
            });
        }
        self.forward(&rows)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub tags: Vec<String>,
    pub custom: HashMap<String, String>,
}
