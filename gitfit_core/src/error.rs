//! Error types for the gitfit_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for gitfit_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// State management error
    #[error("State error: {0}")]
    State(String),

    /// A category name that the config does not define
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// A category or exercise was not in its remaining pool when recorded
    #[error("Not found in rotation: {0}")]
    NotFound(String),

    /// Selection could not be made
    #[error("Rotation error: {0}")]
    Rotation(String),

    /// Text-to-speech invocation failed
    #[error("Speech error: {0}")]
    Speech(String),
}
