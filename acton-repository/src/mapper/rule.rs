//! Member mapping rules

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{MappingError, MappingResult};

type Compute<S> = Arc<dyn Fn(&S) -> Result<Value, serde_json::Error> + Send + Sync>;

/// How one destination member gets its value
pub enum MappingRule<S> {
    /// Copy the source member with this name
    Rename(String),
    /// Derive the value from the whole source
    Computed(Compute<S>),
    /// Leave the destination member untouched
    Ignore,
}

impl<S> MappingRule<S> {
    /// Copy from the source member named `source`
    pub fn rename(source: impl Into<String>) -> Self {
        Self::Rename(source.into())
    }

    /// Derive the value with `compute`
    pub fn computed<T, F>(compute: F) -> Self
    where
        T: Serialize,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(move |source| serde_json::to_value(compute(source))))
    }
}

impl<S> Clone for MappingRule<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Rename(source) => Self::Rename(source.clone()),
            Self::Computed(compute) => Self::Computed(Arc::clone(compute)),
            Self::Ignore => Self::Ignore,
        }
    }
}

impl<S> fmt::Debug for MappingRule<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rename(source) => f.debug_tuple("Rename").field(source).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
            Self::Ignore => f.write_str("Ignore"),
        }
    }
}

/// Compiled plan entry for one destination member
pub(super) enum MemberPlan<S> {
    /// Same-name copy, kept only when the destination accepts the value
    Convention,
    /// Explicit rule
    Rule(MappingRule<S>),
}

impl<S> fmt::Debug for MemberPlan<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convention => f.write_str("Convention"),
            Self::Rule(rule) => f.debug_tuple("Rule").field(rule).finish(),
        }
    }
}

impl<S> MemberPlan<S> {
    pub(super) fn is_convention(&self) -> bool {
        matches!(self, Self::Convention)
    }

    /// Value to write into `member`, `None` to keep the current one
    ///
    /// Convention values are candidates; the caller still checks that the
    /// destination type accepts them.
    pub(super) fn resolve(
        &self,
        member: &str,
        source: &S,
        fields: &Map<String, Value>,
    ) -> MappingResult<Option<Value>> {
        match self {
            Self::Convention => Ok(fields.get(member).cloned()),
            Self::Rule(MappingRule::Rename(source_member)) => fields
                .get(source_member)
                .cloned()
                .map(Some)
                .ok_or_else(|| MappingError::MissingSource {
                    member: member.to_string(),
                    source_member: source_member.clone(),
                }),
            Self::Rule(MappingRule::Computed(compute)) => Ok(Some(compute(source)?)),
            Self::Rule(MappingRule::Ignore) => Ok(None),
        }
    }
}
