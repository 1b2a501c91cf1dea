// src/error.rs

use thiserror::Error;

/// Errors raised while setting up or running channels. The buffer
/// operations themselves never fail.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid ring capacity: {0}")]
    InvalidCapacity(usize),
}

impl Error {
    /// Maps the error to a process exit status.
    pub fn to_status_code(&self) -> u8 {
        match self {
            Error::Io(_) => 1,
            Error::Config(_) | Error::Toml(_) => 2,
            Error::InvalidCapacity(_) => 3,
        }
    }
}
