//! Identity reconciliation before mutations
//!
//! A session tracks at most one instance per id. Callers routinely hand the
//! repository a fresh copy of a row the session already observed, so before
//! an update or remove is attached the stale instance is detached.

use crate::entity::{Entity, TRANSIENT_ID};
use crate::store::{EntitySet, EntityState, SessionResult};

/// Outcome of reconciling a mutation target with the tracked set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Nothing with that identity was tracked
    NoOp,
    /// A tracked instance was detached; holds the state it was in
    Detached(EntityState),
}

/// Attaches mutation targets to a session without duplicating identities
pub struct EntityStateTracker<'s, S> {
    session: &'s mut S,
}

impl<'s, S> EntityStateTracker<'s, S> {
    /// Borrow a session for reconciliation
    pub fn new(session: &'s mut S) -> Self {
        Self { session }
    }

    /// Detach any tracked instance sharing `entity`'s id
    ///
    /// Transient entities (`id == 0`) are never looked up.
    pub fn reconcile<E>(&mut self, entity: &E) -> Reconciliation
    where
        E: Entity,
        S: EntitySet<E>,
    {
        if entity.is_transient() {
            return Reconciliation::NoOp;
        }
        let id = entity.id();
        match self.session.tracked_state(id) {
            Some(state) if self.session.detach(id) => {
                tracing::debug!(
                    entity = E::entity_name(),
                    id,
                    %state,
                    "Detached tracked instance before attaching a new one"
                );
                Reconciliation::Detached(state)
            }
            _ => Reconciliation::NoOp,
        }
    }

    /// Attach `entity` as a new row; the store assigns the id
    pub fn attach_added<E>(&mut self, mut entity: E) -> SessionResult<E>
    where
        E: Entity,
        S: EntitySet<E>,
    {
        entity.set_id(TRANSIENT_ID);
        self.session.mark_added(entity)
    }

    /// Reconcile, then attach `entity` for update
    pub fn attach_modified<E>(&mut self, entity: E) -> SessionResult<Reconciliation>
    where
        E: Entity,
        S: EntitySet<E>,
    {
        let outcome = self.reconcile(&entity);
        self.session.mark_modified(entity)?;
        Ok(outcome)
    }

    /// Reconcile, then attach `entity` for deletion
    pub fn attach_deleted<E>(&mut self, entity: E) -> SessionResult<Reconciliation>
    where
        E: Entity,
        S: EntitySet<E>,
    {
        let outcome = self.reconcile(&entity);
        self.session.mark_deleted(entity)?;
        Ok(outcome)
    }
}
