//! Error types and exit codes for clonemap

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for clonemap operations
#[derive(Error, Debug)]
pub enum CloneMapError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Input exceeds limit: {message}")]
    InputTooLarge { message: String },

    #[error("Failed to parse input document: {message}")]
    ParseFailure { message: String },

    #[error("Report serialization failed: {message}")]
    SerializationFailure { message: String },

    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloneMapError {
    /// Convert error to appropriate exit code:
    /// - 0: Success
    /// - 1: Runtime error (IO, serialization, cancellation)
    /// - 2: Input validation failure (malformed or oversized input)
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput { .. } => ExitCode::from(2),
            Self::InputTooLarge { .. } => ExitCode::from(2),
            Self::ParseFailure { .. } => ExitCode::from(2),
            Self::SerializationFailure { .. } => ExitCode::from(1),
            Self::Cancelled => ExitCode::from(1),
            Self::Io(_) => ExitCode::from(1),
        }
    }
}

/// Result type alias for clonemap operations
pub type Result<T> = std::result::Result<T, CloneMapError>;
