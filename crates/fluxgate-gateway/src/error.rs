use thiserror::Error;

/// Terminal failure of a gateway request. The message is what the caller
/// sees; diagnostic detail is logged where the error is created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    DependencyUnavailable(String),

    #[error("{0}")]
    InferenceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::BadRequest(_) => 400,
            GatewayError::NotFound(_) => 404,
            GatewayError::UnsupportedMediaType(_) => 415,
            GatewayError::DependencyUnavailable(_) | GatewayError::InferenceUnavailable(_) => 503,
            GatewayError::Internal(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::UnsupportedMediaType(_) => "unsupported_media_type",
            GatewayError::DependencyUnavailable(_) => "dependency_unavailable",
            GatewayError::InferenceUnavailable(_) => "inference_unavailable",
            GatewayError::Internal(_) => "internal",
        }
    }
}
