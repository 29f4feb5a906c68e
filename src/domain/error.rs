//! Domain error types

use thiserror::Error;

use crate::domain::recording::RecorderStatus;

/// Error when session constraints are rejected at construction
#[derive(Debug, Clone, Error)]
#[error("Invalid session constraints: {message}")]
pub struct InvalidConstraintsError {
    pub message: String,
}

/// Error when an invalid status transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_status} state")]
pub struct InvalidStateTransition {
    pub current_status: RecorderStatus,
    pub action: &'static str,
}

/// A recorded failure, deduplicated by message within a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub message: String,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
