//! Error types for the Recollect domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Recollect operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Storage collaborator errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Input validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures reported by a storage collaborator (fact, message or topic store).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing store could not be reached at all.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A uniqueness constraint rejected the write. For facts this is the
    /// atomic dedup signal and is not a failure from the caller's view.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Store call timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Malformed input. Engine entry points absorb these and return empty
/// results instead of surfacing them.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Input is empty or whitespace only")]
    EmptyInput,

    #[error("Invalid owner id: {0:?}")]
    InvalidOwner(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_displays_correctly() {
        let err = Error::Store(StoreError::Unavailable("connection refused".into()));
        assert!(err.to_string().contains("unavailable"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn duplicate_is_detectable() {
        assert!(StoreError::Duplicate("job:google".into()).is_duplicate());
        assert!(!StoreError::Timeout { millis: 10 }.is_duplicate());
    }

    #[test]
    fn validation_error_wraps() {
        let err: Error = ValidationError::EmptyInput.into();
        assert!(err.to_string().contains("empty"));
    }
}
