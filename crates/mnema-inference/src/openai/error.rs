//! Mapping of OpenAI-style error responses onto [`mnema_core::Error`].

use mnema_core::Error;

/// Which capability a failed request served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Embedding,
    Generation,
}

impl Capability {
    fn wrap(self, message: String) -> Error {
        match self {
            Self::Embedding => Error::Embedding(message),
            Self::Generation => Error::Inference(message),
        }
    }
}

/// Classified failure of an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    AuthenticationError,
    RateLimitExceeded,
    ModelNotFound,
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl OpenAIErrorCode {
    /// Classify by HTTP status, then by the envelope's `type` field.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match status {
            401 | 403 => Self::AuthenticationError,
            429 => Self::RateLimitExceeded,
            404 => Self::ModelNotFound,
            500..=599 => Self::ServerError,
            _ if error_type == "model_not_found" => Self::ModelNotFound,
            400 if error_type.contains("context_length") => Self::ContextLengthExceeded,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

/// Credential and model problems are configuration errors; the rest fail
/// the capability that made the request.
pub fn to_mnema_error(code: OpenAIErrorCode, message: &str, capability: Capability) -> Error {
    match code {
        OpenAIErrorCode::AuthenticationError => {
            Error::Config(format!("Authentication failed: {}", message))
        }
        OpenAIErrorCode::ModelNotFound => Error::Config(format!("Model not found: {}", message)),
        OpenAIErrorCode::RateLimitExceeded => {
            capability.wrap(format!("Rate limit exceeded: {}", message))
        }
        OpenAIErrorCode::ContextLengthExceeded => {
            capability.wrap(format!("Context too long: {}", message))
        }
        OpenAIErrorCode::ServerError => capability.wrap(format!("Server error: {}", message)),
        OpenAIErrorCode::Unknown => capability.wrap(message.to_string()),
    }
}
