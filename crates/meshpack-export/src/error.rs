//! Export errors

use thiserror::Error;

/// glTF export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid scene: {0}")]
    Scene(#[from] meshpack_core::Error),

    /// The exporter was configured inconsistently
    #[error("Invalid export options: {0}")]
    Config(String),

    /// An internal invariant of the serializer does not hold
    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Compression failed: {0}")]
    Compression(String),
}

impl ExportError {
    pub fn contract(message: impl Into<String>) -> Self {
        ExportError::Contract(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        ExportError::Config(message.into())
    }

    /// Whether the error is an internal invariant failure
    pub fn is_contract(&self) -> bool {
        matches!(self, ExportError::Contract(_))
    }
}

pub type ExportResult<T> = Result<T, ExportError>;
