use thiserror::Error;

/// Shared error type used across all NeuraProof crates.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed caller input. Never fatal.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Jurisdiction blocked: {0}")]
    JurisdictionBlocked(String),

    #[error("Transaction feed unavailable: {0}")]
    FeedUnavailable(String),

    /// A registry allocated an id that already exists. Indicates a sequencing bug.
    #[error("Duplicate token id: {0}")]
    DuplicateTokenId(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] eyre::Error),
}

impl AppError {
    /// Whether the failure was caused by the caller rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_) | AppError::JurisdictionBlocked(_) | AppError::NotFound(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_faults_are_client_errors() {
        assert!(AppError::Validation("bad".into()).is_client_error());
        assert!(AppError::JurisdictionBlocked("KP".into()).is_client_error());
        assert!(AppError::NotFound("proof #9".into()).is_client_error());
        assert!(!AppError::FeedUnavailable("down".into()).is_client_error());
        assert!(!AppError::DuplicateTokenId(3).is_client_error());
        assert!(!AppError::Database("gone".into()).is_client_error());
    }
}
