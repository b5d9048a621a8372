use axum::http::StatusCode;
use fluxgate_core::{CodecError, ModelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Endpoint not found: {0}")]
    UnknownEndpoint(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Codec(CodecError::MalformedInput(_)) => StatusCode::BAD_REQUEST,
            Error::Codec(CodecError::UnsupportedMediaType(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::Codec(CodecError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Model(ModelError::Shape { .. } | ModelError::EmptyBatch) => {
                StatusCode::BAD_REQUEST
            }
            Error::Model(ModelError::Load(_) | ModelError::Backend(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
        }
    }
}
