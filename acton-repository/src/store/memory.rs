//! In-memory storage engine
//!
//! [`InMemoryStore`] holds the committed rows of one entity type, ordered by
//! id, with a unique index on `uuid`. Ids come from a monotonically increasing
//! sequence and are never reused, even when the insert that reserved them
//! fails. [`InMemorySession`] is the unit of work over a store.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = InMemoryStore::<User>::new();
//! let session = SessionHandle::open(&store);
//! let users = BaseAsyncRepository::new(session);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    EntitySet, EntityState, SessionError, SessionFactory, SessionResult, StorageSession, TrackedSet,
};
use crate::config::StoreConfig;
use crate::entity::Entity;
use crate::repository::query::Query;

const UUID_CONSTRAINT: &str = "uuid_unique";

#[derive(Debug, Clone)]
struct StoreRows<E> {
    by_id: BTreeMap<i64, E>,
    uuids: HashMap<Uuid, i64>,
}

impl<E: Entity> StoreRows<E> {
    fn insert(&mut self, entity: E) -> SessionResult<()> {
        let id = entity.id();
        let uuid = entity.uuid();
        if self.uuids.contains_key(&uuid) {
            return Err(uuid_violation(uuid));
        }
        if self.by_id.contains_key(&id) {
            return Err(SessionError::ConstraintViolation {
                constraint: "primary_key".to_string(),
                message: format!("id {id} already exists"),
            });
        }
        self.uuids.insert(uuid, id);
        self.by_id.insert(id, entity);
        Ok(())
    }

    /// Replace the row with the same id; `false` when no such row exists
    fn replace(&mut self, entity: E) -> SessionResult<bool> {
        let id = entity.id();
        let uuid = entity.uuid();
        let Some(current) = self.by_id.get(&id) else {
            return Ok(false);
        };
        let previous_uuid = current.uuid();
        if previous_uuid != uuid {
            if self.uuids.contains_key(&uuid) {
                return Err(uuid_violation(uuid));
            }
            self.uuids.remove(&previous_uuid);
            self.uuids.insert(uuid, id);
        }
        self.by_id.insert(id, entity);
        Ok(true)
    }

    /// Delete the row with this id; `false` when no such row exists
    fn delete(&mut self, id: i64) -> bool {
        match self.by_id.remove(&id) {
            Some(removed) => {
                self.uuids.remove(&removed.uuid());
                true
            }
            None => false,
        }
    }
}

fn uuid_violation(uuid: Uuid) -> SessionError {
    SessionError::ConstraintViolation {
        constraint: UUID_CONSTRAINT.to_string(),
        message: format!("uuid {uuid} already exists"),
    }
}

struct StoreInner<E> {
    rows: RwLock<StoreRows<E>>,
    next_id: AtomicI64,
    available: AtomicBool,
}

/// Committed rows of one entity type, shared by every session opened on it
pub struct InMemoryStore<E> {
    inner: Arc<StoreInner<E>>,
}

impl<E: Entity> InMemoryStore<E> {
    /// Empty store whose first assigned id is `1`
    pub fn new() -> Self {
        Self::with_id_seed(1)
    }

    /// Empty store whose first assigned id is `seed` (clamped to at least `1`)
    pub fn with_id_seed(seed: i64) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                rows: RwLock::new(StoreRows {
                    by_id: BTreeMap::new(),
                    uuids: HashMap::new(),
                }),
                next_id: AtomicI64::new(seed.max(1)),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Empty store configured from [`StoreConfig`]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::with_id_seed(config.id_seed)
    }

    /// Load rows directly, bypassing sessions
    ///
    /// Rows keep their ids; transient rows get the next id from the sequence.
    /// The sequence moves past the highest id loaded.
    pub async fn seed<I>(&self, rows: I) -> SessionResult<()>
    where
        I: IntoIterator<Item = E>,
    {
        let mut committed = self.inner.rows.write().await;
        let mut staged = committed.clone();
        for mut row in rows {
            if row.is_transient() {
                row.set_id(self.reserve_id());
            }
            self.inner.next_id.fetch_max(row.id() + 1, Ordering::SeqCst);
            staged.insert(row)?;
        }
        *committed = staged;
        Ok(())
    }

    /// Simulate losing (or regaining) the connection to the store
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Whether the store currently accepts calls
    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Number of committed rows
    pub async fn len(&self) -> usize {
        self.inner.rows.read().await.by_id.len()
    }

    /// Whether there are no committed rows
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Open a unit of work on this store
    pub fn session(&self) -> InMemorySession<E> {
        InMemorySession {
            store: self.clone(),
            tracked: TrackedSet::new(),
        }
    }

    fn reserve_id(&self) -> i64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn ensure_available(&self) -> SessionResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(SessionError::Unavailable(
                "in-memory store is offline".to_string(),
            ))
        }
    }

    async fn read_rows<T, F>(&self, cancel: &CancellationToken, read: F) -> SessionResult<T>
    where
        F: FnOnce(&StoreRows<E>) -> T + Send,
    {
        self.ensure_available()?;
        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(SessionError::Cancelled),
            rows = self.inner.rows.read() => Ok(read(&rows)),
        }
    }
}

impl<E: Entity> Default for InMemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for InMemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> std::fmt::Debug for InMemoryStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("next_id", &self.inner.next_id.load(Ordering::SeqCst))
            .field("available", &self.inner.available.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<E: Entity> SessionFactory for InMemoryStore<E> {
    type Session = InMemorySession<E>;

    fn create_session(&self) -> Self::Session {
        self.session()
    }
}

/// Unit of work over an [`InMemoryStore`]
#[derive(Debug)]
pub struct InMemorySession<E> {
    store: InMemoryStore<E>,
    tracked: TrackedSet<E>,
}

impl<E: Entity> InMemorySession<E> {
    /// Instances this session currently tracks
    pub fn tracked(&self) -> &TrackedSet<E> {
        &self.tracked
    }

    /// Store this session writes to
    pub fn store(&self) -> &InMemoryStore<E> {
        &self.store
    }
}

impl<E: Entity> StorageSession for InMemorySession<E> {
    async fn save_changes(&mut self, cancel: &CancellationToken) -> SessionResult<u64> {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        if !self.tracked.has_changes() {
            return Ok(0);
        }
        self.store.ensure_available()?;

        let mut committed = tokio::select! {
            biased;

            () = cancel.cancelled() => return Err(SessionError::Cancelled),
            rows = self.store.inner.rows.write() => rows,
        };

        // Stage on a copy so a failing change leaves the committed rows untouched
        let mut staged = committed.clone();
        let mut affected = 0_u64;
        let mut missing = Vec::new();

        for entry in self.tracked.pending() {
            let id = entry.entity.id();
            let applied = match entry.state {
                EntityState::Added => {
                    staged.insert(entry.entity.clone())?;
                    true
                }
                EntityState::Modified => staged.replace(entry.entity.clone())?,
                EntityState::Deleted => staged.delete(id),
                EntityState::Unchanged => continue,
            };
            if applied {
                affected += 1;
            } else {
                missing.push(id);
            }
        }

        *committed = staged;
        drop(committed);

        self.tracked.accept_changes(&missing);
        tracing::debug!(
            entity = E::entity_name(),
            rows_affected = affected,
            unmatched = missing.len(),
            "Saved pending changes"
        );
        Ok(affected)
    }
}

impl<E: Entity> EntitySet<E> for InMemorySession<E> {
    async fn fetch(&self, query: &Query<E>, cancel: &CancellationToken) -> SessionResult<Vec<E>> {
        self.store
            .read_rows(cancel, |rows| {
                query.evaluate(rows.by_id.values()).cloned().collect()
            })
            .await
    }

    async fn first(&self, query: &Query<E>, cancel: &CancellationToken) -> SessionResult<Option<E>> {
        self.store
            .read_rows(cancel, |rows| query.evaluate(rows.by_id.values()).next().cloned())
            .await
    }

    async fn count(&self, query: &Query<E>, cancel: &CancellationToken) -> SessionResult<u64> {
        self.store
            .read_rows(cancel, |rows| query.evaluate(rows.by_id.values()).count() as u64)
            .await
    }

    async fn any(&self, query: &Query<E>, cancel: &CancellationToken) -> SessionResult<bool> {
        self.store
            .read_rows(cancel, |rows| query.evaluate(rows.by_id.values()).next().is_some())
            .await
    }

    fn tracked_state(&self, id: i64) -> Option<EntityState> {
        self.tracked.state(id)
    }

    fn mark_added(&mut self, mut entity: E) -> SessionResult<E> {
        entity.set_id(self.store.reserve_id());
        self.tracked.attach(entity.clone(), EntityState::Added)?;
        Ok(entity)
    }

    fn mark_modified(&mut self, entity: E) -> SessionResult<()> {
        self.tracked.attach(entity, EntityState::Modified)
    }

    fn mark_deleted(&mut self, entity: E) -> SessionResult<()> {
        self.tracked.attach(entity, EntityState::Deleted)
    }

    fn detach(&mut self, id: i64) -> bool {
        self.tracked.detach(id).is_some()
    }

    fn detach_all(&mut self) -> usize {
        self.tracked.clear()
    }
}
