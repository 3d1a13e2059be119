//! Unified error handling for meshpack
//!
//! This module provides the error type used while building and validating
//! the scene model. The exporter wraps it in its own error type.

use thiserror::Error;

/// Unified error type for scene model operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Model Errors ====================

    /// Invalid data structure
    #[error("Invalid data: {message}")]
    InvalidData {
        message: String,
    },

    /// An entity refers to another entity that does not exist
    #[error("Invalid reference: {kind} {index} (only {count} defined)")]
    InvalidReference {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    // ==================== General Errors ====================

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    /// Check if this is a dangling-reference error, looking through context wrappers
    pub fn is_invalid_reference(&self) -> bool {
        match self {
            Error::InvalidReference { .. } => true,
            Error::WithContext { source, .. } => source.is_invalid_reference(),
            _ => false,
        }
    }

    /// Check if this is an invalid data error, looking through context wrappers
    pub fn is_invalid_data(&self) -> bool {
        match self {
            Error::InvalidData { .. } => true,
            Error::WithContext { source, .. } => source.is_invalid_data(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
