//! Crate-level error type

use thiserror::Error;

use crate::mapper::MappingError;
use crate::repository::RepositoryError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Structured repository error with operation context
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Mapper construction or translation error
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Logging could not be initialized
    #[error("Tracing initialization error: {0}")]
    Tracing(String),
}

impl Error {
    /// Whether retrying the same call may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Repository(e) if e.is_retriable())
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryOperation;
    use crate::store::SessionError;

    #[test]
    fn test_repository_error_passes_through() {
        let err: Error =
            RepositoryError::validation_failed(RepositoryOperation::FindAllPaged, "page_size must be > 0")
                .into();
        assert!(err.to_string().contains("page_size must be > 0"));
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_retriable_repository_error() {
        let err: Error = RepositoryError::from_session(
            RepositoryOperation::Count,
            SessionError::Unavailable("offline".to_string()),
        )
        .into();
        assert!(err.is_retriable());
    }

    #[test]
    fn test_config_error_is_boxed() {
        let err: Error = figment::Error::from("missing field `name`".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_mapping_error_conversion() {
        let err: Error = MappingError::DuplicateRule {
            member: "email".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Mapping(_)));
    }
}
