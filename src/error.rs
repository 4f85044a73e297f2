//! Error types for Relevo

use crate::config::ValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Persistence or prediction was attempted before a module existed
    #[error("Model not trained: {0}")]
    NotTrained(String),

    /// A named submodule is missing, or loading its weights failed
    #[error("Module lookup failed: {0}")]
    ModuleLookup(String),

    /// Strict state-dict load failed (missing/unexpected keys, size mismatch)
    #[error("State dict mismatch: {0}")]
    StateMismatch(String),

    /// An override value cannot be reconciled with the section it targets
    #[error("Cannot override config: {0}")]
    ConfigOverride(String),

    /// The loaded pretrained artifact is not a compatible model
    #[error("Pretrained model type mismatch: expected '{expected}', found '{found}'")]
    PretrainedModelType { expected: String, found: String },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid config: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
