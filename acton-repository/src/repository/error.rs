//! Repository error types
//!
//! Structured errors for repository operations. Every failure carries the
//! operation that was running, a category, and optionally the entity involved.
//! Failures that originate in the storage session keep the [`SessionError`] as
//! their [`source`](std::error::Error::source).
//!
//! "Not found" is deliberately absent from the categories: lookups return
//! `Option`/empty collections instead.
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
//!
//! let error = RepositoryError::validation_failed(RepositoryOperation::FindAllPaged, "page_size must be > 0");
//! assert!(matches!(error.kind, RepositoryErrorKind::ValidationFailed));
//! assert!(!error.is_persistence());
//! ```

use std::fmt;

use crate::store::SessionError;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Finding a single entity (by id, uuid or predicate)
    Find,
    /// Finding all entities matching an optional predicate
    FindAll,
    /// Finding a page of entities
    FindAllPaged,
    /// Counting entities
    Count,
    /// Checking if an entity exists
    Exists,
    /// Creating a new entity
    Create,
    /// Updating an existing entity
    Update,
    /// Removing an entity
    Remove,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => write!(f, "find"),
            Self::FindAll => write!(f, "find_all"),
            Self::FindAllPaged => write!(f, "find_all_paged"),
            Self::Count => write!(f, "count"),
            Self::Exists => write!(f, "exists"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Malformed request (e.g. an invalid pagination spec)
    ValidationFailed,
    /// The store rejected a write because of a constraint
    ConstraintViolation,
    /// The store could not be reached
    ConnectionFailed,
    /// Any other store-level failure
    DatabaseError,
    /// The cancellation token fired before the store call completed
    Cancelled,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Structured repository error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "User")
    pub entity_type: Option<String>,
    /// The id or uuid of the entity involved
    pub entity_id: Option<String>,
    /// Storage session failure that caused this error
    pub cause: Option<SessionError>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            cause: None,
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a cancellation error
    pub fn cancelled(operation: RepositoryOperation) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::Cancelled,
            "Operation cancelled before the store call completed",
        )
    }

    /// Wrap a storage session failure
    ///
    /// Cancellation is normalized into [`RepositoryErrorKind::Cancelled`]; every
    /// other session failure becomes a persistence error holding the cause.
    pub fn from_session(operation: RepositoryOperation, error: SessionError) -> Self {
        let kind = match &error {
            SessionError::Cancelled => return Self::cancelled(operation),
            SessionError::ConstraintViolation { .. } | SessionError::DuplicateIdentity { .. } => {
                RepositoryErrorKind::ConstraintViolation
            }
            SessionError::Unavailable(_) => RepositoryErrorKind::ConnectionFailed,
            SessionError::Other(_) => RepositoryErrorKind::DatabaseError,
        };
        Self {
            operation,
            kind,
            message: error.to_string(),
            entity_type: None,
            entity_id: None,
            cause: Some(error),
        }
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether the store rejected or failed the call
    pub fn is_persistence(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConstraintViolation
                | RepositoryErrorKind::ConnectionFailed
                | RepositoryErrorKind::DatabaseError
        )
    }

    /// Whether the cancellation token stopped the call
    pub fn is_cancelled(&self) -> bool {
        self.kind == RepositoryErrorKind::Cancelled
    }

    /// Check if this error is transient and the caller may retry
    ///
    /// The repository itself never retries.
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, RepositoryErrorKind::ConnectionFailed)
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
