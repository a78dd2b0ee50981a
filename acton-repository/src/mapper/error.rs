//! Mapping error types

use thiserror::Error;

/// Result type for mapper construction and translation
pub type MappingResult<T> = std::result::Result<T, MappingError>;

/// Failure while building or running a [`FieldMapper`](super::FieldMapper)
#[derive(Debug, Error)]
pub enum MappingError {
    /// A rule targets a member the destination type does not have
    #[error("`{type_name}` has no member `{member}`")]
    UnknownMember {
        /// Destination type
        type_name: &'static str,
        /// Rule target
        member: String,
    },

    /// Two rules target the same destination member
    #[error("member `{member}` already has a mapping rule")]
    DuplicateRule {
        /// Rule target
        member: String,
    },

    /// The type does not serialize to a map of named members
    #[error("`{type_name}` does not serialize to a map of named members")]
    NotAStruct {
        /// Offending type
        type_name: &'static str,
    },

    /// A rename rule points at a member the source value does not carry
    #[error("source member `{source_member}` for `{member}` is missing")]
    MissingSource {
        /// Destination member
        member: String,
        /// Source member named by the rule
        source_member: String,
    },

    /// Serializing the source or deserializing the destination failed
    #[error("value conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = MappingError::UnknownMember {
            type_name: "UserDto",
            member: "nickname".to_string(),
        };
        assert_eq!(error.to_string(), "`UserDto` has no member `nickname`");

        let error = MappingError::MissingSource {
            member: "id".to_string(),
            source_member: "uuid".to_string(),
        };
        assert_eq!(error.to_string(), "source member `uuid` for `id` is missing");
    }
}
