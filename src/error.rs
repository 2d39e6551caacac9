//! Error types for Silt

use thiserror::Error;

/// Result type alias for Silt operations
pub type Result<T> = std::result::Result<T, SiltError>;

/// Silt error types
#[derive(Error, Debug)]
pub enum SiltError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// The empty key is reserved and may not be written
    #[error("Empty key is reserved")]
    EmptyKey,

    /// Compaction requested for a level that has no next level
    #[error("Cannot compact level {0}: no next level")]
    InvalidLevel(usize),
}

impl SiltError {
    /// Check if error indicates corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, SiltError::Corruption(_))
    }
}
