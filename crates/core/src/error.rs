//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid seed: expected {expected} bytes, got {actual}")]
    InvalidSeed { expected: usize, actual: usize },

    #[error("invalid obfuscation parameters: {0}")]
    InvalidParams(String),

    #[error("obfuscation error: {0}")]
    Obfuscation(String),

    #[error("chunk plan error: {0}")]
    Plan(String),

    #[error("insufficient total space: need {needed} bytes, have {available} bytes")]
    InsufficientSpace { needed: u64, available: u64 },

    #[error("split error: {0}")]
    Split(String),

    #[error("reconstruction error: {0}")]
    Reconstruction(String),

    #[error("invalid key file: {0}")]
    KeyFile(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
