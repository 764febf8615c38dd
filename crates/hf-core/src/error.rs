//! Error types for hf3prong

use thiserror::Error;

/// hf3prong error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error (malformed configuration or input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Singular or non-positive-definite covariance, or degenerate geometry
    #[error("Numerical failure: {0}")]
    Numerical(String),

    /// Fitted result outside the configured physical bounds
    #[error("Unphysical result: {0}")]
    Unphysical(String),

    /// Corrupt simulated record or dangling index
    #[error("Structural inconsistency: {0}")]
    Structural(String),
}

impl Error {
    /// Whether the error concerns a single input item.
    ///
    /// Item-level errors are skipped by batch drivers; everything else aborts.
    pub fn is_item_level(&self) -> bool {
        matches!(self, Error::Numerical(_) | Error::Unphysical(_) | Error::Structural(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
