use thiserror::Error;

/// Every way a request through the conversion pipeline can fail.
///
/// Cloneable so a single in-flight conversion can hand its outcome to every
/// request waiting on it; I/O errors are therefore kept as their message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conversion from {from} to {to} is not supported")]
    UnsupportedConversion { from: String, to: String },

    #[error("Conversion failed, {0}")]
    ArtifactNotFound(String),

    #[error("Converter failed: {0}")]
    CapabilityFailure(String),

    #[error("Storage failure: {0}")]
    IoFailure(String),

    #[error("Conversion did not finish within {0} seconds")]
    Timeout(u64),
}

impl ConversionError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        ConversionError::InvalidRequest(message.into())
    }

    pub fn capability(message: impl Into<String>) -> Self {
        ConversionError::CapabilityFailure(message.into())
    }

    /// Caller-side problems, as opposed to missing resources or server faults.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ConversionError::InvalidRequest(_) | ConversionError::UnsupportedConversion { .. })
    }
}

impl From<std::io::Error> for ConversionError {
    fn from(err: std::io::Error) -> Self {
        ConversionError::IoFailure(err.to_string())
    }
}

pub type ConversionResult<T> = Result<T, ConversionError>;
