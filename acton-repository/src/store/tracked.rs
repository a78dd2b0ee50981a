//! Session-local identity map

use std::collections::BTreeMap;

use super::{SessionError, SessionResult};
use crate::entity::Entity;

/// Tracking state of an attached instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Matches the committed row
    Unchanged,
    /// Pending insert
    Added,
    /// Pending update
    Modified,
    /// Pending delete
    Deleted,
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// One tracked instance and its state
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntry<E> {
    /// The tracked instance
    pub entity: E,
    /// Pending change, if any
    pub state: EntityState,
}

/// Identity map of the instances a session currently observes
///
/// Keyed by surrogate id. Holds at most one instance per id; attaching a
/// second one fails with [`SessionError::DuplicateIdentity`].
#[derive(Debug, Clone)]
pub struct TrackedSet<E> {
    entries: BTreeMap<i64, TrackedEntry<E>>,
}

impl<E: Entity> TrackedSet<E> {
    /// Empty tracked set
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Start tracking `entity` in `state`
    pub fn attach(&mut self, entity: E, state: EntityState) -> SessionResult<()> {
        let id = entity.id();
        if self.entries.contains_key(&id) {
            return Err(SessionError::DuplicateIdentity { id });
        }
        self.entries.insert(id, TrackedEntry { entity, state });
        Ok(())
    }

    /// Stop tracking the instance with this id
    pub fn detach(&mut self, id: i64) -> Option<TrackedEntry<E>> {
        self.entries.remove(&id)
    }

    /// Tracked instance with this id
    pub fn get(&self, id: i64) -> Option<&TrackedEntry<E>> {
        self.entries.get(&id)
    }

    /// State of the tracked instance with this id
    pub fn state(&self, id: i64) -> Option<EntityState> {
        self.entries.get(&id).map(|entry| entry.state)
    }

    /// Entries with a pending change, ordered by id
    pub fn pending(&self) -> impl Iterator<Item = &TrackedEntry<E>> {
        self.entries
            .values()
            .filter(|entry| entry.state != EntityState::Unchanged)
    }

    /// Whether any entry has a pending change
    pub fn has_changes(&self) -> bool {
        self.pending().next().is_some()
    }

    /// Settle the tracked set after a successful save
    ///
    /// Inserted and updated instances become `Unchanged`; deleted ones and
    /// those whose write matched no row (`missing`) are detached.
    pub fn accept_changes(&mut self, missing: &[i64]) {
        for id in missing {
            self.entries.remove(id);
        }
        self.entries
            .retain(|_, entry| entry.state != EntityState::Deleted);
        for entry in self.entries.values_mut() {
            entry.state = EntityState::Unchanged;
        }
    }

    /// Detach everything, returning how many instances were tracked
    pub fn clear(&mut self) -> usize {
        let detached = self.entries.len();
        self.entries.clear();
        detached
    }

    /// Number of tracked instances
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Entity> Default for TrackedSet<E> {
    fn default() -> Self {
        Self::new()
    }
}
