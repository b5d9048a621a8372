use fluxgate_core::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model_info.json: {0}")]
    Info(#[from] serde_json::Error),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for ModelError {
    fn from(err: Error) -> Self {
        ModelError::Load(err.to_string())
    }
}
