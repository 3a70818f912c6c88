use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenImgError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Transport error: {0}")]
    TransportError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl GenImgError {
    pub fn is_validation(&self) -> bool {
        matches!(self, GenImgError::ValidationError(_))
    }
}

impl From<reqwest::Error> for GenImgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GenImgError::ProviderError(format!("malformed response body: {}", e))
        } else {
            GenImgError::TransportError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for GenImgError {
    fn from(e: serde_json::Error) -> Self {
        GenImgError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for GenImgError {
    fn from(e: std::io::Error) -> Self {
        GenImgError::IoError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenImgError>;
