//! Crate-wide error type.
//!
//! Every error maps to a process exit code so the binary can report failures
//! consistently:
//!
//! - `2`: usage / configuration / file access
//! - `3`: malformed or insufficient input data
//! - `4`: grid integrity (missing luminosity logs, inconsistent records)
//! - `5`: non-finite numerical output

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Data(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("{0}")]
    Numeric(String),
}

impl AppError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    pub fn numeric(message: impl Into<String>) -> Self {
        Self::Numeric(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Usage(_) | AppError::Io(_) => 2,
            AppError::Data(_) => 3,
            AppError::Integrity(_) => 4,
            AppError::Numeric(_) => 5,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("JSON error: {err}"))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        Self::Io(format!("CSV error: {err}"))
    }
}
