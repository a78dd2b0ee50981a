//! Storage session contracts
//!
//! Repositories never talk to a storage engine directly. They go through a
//! session: one unit of work that owns a [`TrackedSet`] and persists every
//! pending change in a single [`StorageSession::save_changes`] call.
//!
//! - [`StorageSession`]: save pending changes atomically
//! - [`EntitySet`]: typed query entry point and change tracking for one entity type
//! - [`SessionHandle`]: shared, serialized access to one session
//! - [`SessionFactory`]: creates fresh sessions (one per unit of work)
//!
//! Every asynchronous call takes a [`CancellationToken`]. The token is only
//! observed at the store call boundary; a write the store already acknowledged
//! is never rolled back.
//!
//! An in-memory engine lives in [`memory`].

pub mod memory;
mod tracked;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::entity::Entity;
use crate::repository::query::Query;

pub use tracked::{EntityState, TrackedEntry, TrackedSet};

/// Result type for storage session calls
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Failure reported by a storage session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The cancellation token fired before the store call completed
    #[error("operation cancelled")]
    Cancelled,

    /// The store rejected a write because of a constraint
    #[error("constraint `{constraint}` violated: {message}")]
    ConstraintViolation {
        /// Name of the violated constraint
        constraint: String,
        /// Store-provided detail
        message: String,
    },

    /// A second instance with an already tracked identity was attached
    #[error("an instance with id {id} is already tracked")]
    DuplicateIdentity {
        /// Conflicting surrogate key
        id: i64,
    },

    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other store failure
    #[error("{0}")]
    Other(String),
}

/// One unit of work against a storage engine
pub trait StorageSession: Send + Sync {
    /// Persist every pending tracked change as one atomic write
    ///
    /// Returns the number of affected rows; `0` means nothing matched.
    fn save_changes(
        &mut self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = SessionResult<u64>> + Send;
}

/// Typed query entry point and change tracking for one entity type
///
/// Query methods read committed rows and never touch the tracked set.
pub trait EntitySet<E: Entity>: StorageSession {
    /// Every row selected by `query`, in store order
    fn fetch(
        &self,
        query: &Query<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = SessionResult<Vec<E>>> + Send;

    /// First row selected by `query`, in store order
    fn first(
        &self,
        query: &Query<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = SessionResult<Option<E>>> + Send;

    /// Number of rows selected by `query`
    fn count(
        &self,
        query: &Query<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = SessionResult<u64>> + Send;

    /// Whether `query` selects at least one row
    fn any(
        &self,
        query: &Query<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = SessionResult<bool>> + Send;

    /// State of the tracked instance with this id, `None` when detached
    fn tracked_state(&self, id: i64) -> Option<EntityState>;

    /// Track a new entity for insertion
    ///
    /// The store assigns the surrogate key; the returned copy carries it.
    fn mark_added(&mut self, entity: E) -> SessionResult<E>;

    /// Track an entity for update
    fn mark_modified(&mut self, entity: E) -> SessionResult<()>;

    /// Track an entity for deletion
    fn mark_deleted(&mut self, entity: E) -> SessionResult<()>;

    /// Stop tracking the instance with this id; `true` if one was tracked
    fn detach(&mut self, id: i64) -> bool;

    /// Stop tracking every instance; returns how many were tracked
    fn detach_all(&mut self) -> usize;
}

/// Creates a fresh session per unit of work
pub trait SessionFactory {
    /// Session type handed out by this factory
    type Session: StorageSession;

    /// Open a new session with an empty tracked set
    fn create_session(&self) -> Self::Session;
}

/// Shared handle to one session
///
/// Repositories built over the same handle take part in the same unit of
/// work. Access is serialized; the tracked set is never mutated concurrently.
/// Saved instances stay tracked as `Unchanged`, so a handle that outlives its
/// unit of work should be cleared with [`EntitySet::detach_all`].
pub struct SessionHandle<S> {
    inner: Arc<Mutex<S>>,
}

impl<S: StorageSession> SessionHandle<S> {
    /// Wrap a session
    pub fn new(session: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Open a session from a factory and wrap it
    pub fn open<F>(factory: &F) -> Self
    where
        F: SessionFactory<Session = S>,
    {
        Self::new(factory.create_session())
    }

    /// Wait for exclusive access to the session
    pub async fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().await
    }
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}
