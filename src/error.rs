use std::path::PathBuf;

use thiserror::Error;

/// Main application error type for failures that abort a run
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to load contract: {path} - {details}")]
    ContractLoad { path: PathBuf, details: String },

    #[error("Invalid base URL: {url} - {details}")]
    InvalidBaseUrl { url: String, details: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },

    #[error("Export failed: {path} - {details}")]
    Export { path: PathBuf, details: String },
}

/// Failure to dereference a `$ref` pointer inside the contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("External ref not supported: {pointer}")]
    External { pointer: String },

    #[error("Could not resolve ref: {pointer}")]
    Unresolvable { pointer: String },
}

impl From<crate::config::ConfigError> for ValidationError {
    fn from(err: crate::config::ConfigError) -> Self {
        ValidationError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;
