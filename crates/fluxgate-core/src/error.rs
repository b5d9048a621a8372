use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    #[error("Encode failed: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Shape error: expected {expected} features per row, got {got}")]
    Shape { expected: usize, got: usize },

    #[error("Empty batch")]
    EmptyBatch,

    #[error("Model load failed: {0}")]
    Load(String),

    #[error("Backend error: {0}")]
    Backend(String),
}
