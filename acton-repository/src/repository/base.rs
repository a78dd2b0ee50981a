//! Generic repository over a storage session
//!
//! [`BaseAsyncRepository`] implements [`AsyncRepository`] for any entity type
//! against any session implementing [`EntitySet`]. Concrete repositories are
//! usually just type aliases:
//!
//! ```rust,ignore
//! use acton_repository::repository::BaseAsyncRepository;
//! use acton_repository::store::memory::InMemorySession;
//!
//! pub type UserRepository = BaseAsyncRepository<User, InMemorySession<User>>;
//! ```
//!
//! Reads compose a [`Query`] (predicate first, then the page window) and run it
//! without touching the tracked set. Writes reconcile identity through
//! [`EntityStateTracker`] and persist with a single `save_changes` call.

use std::fmt;
use std::marker::PhantomData;

use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{RepositoryError, RepositoryOperation};
use super::pagination::PaginationSpec;
use super::query::{apply_pagination, apply_predicate, Predicate, Query};
use super::tracker::EntityStateTracker;
use super::traits::{AsyncRepository, RepositoryResult};
use crate::entity::Entity;
use crate::store::{EntitySet, SessionError, SessionHandle};

/// Generic CRUD and query implementation for entity type `E` over session `S`
///
/// Repositories built from clones of the same [`SessionHandle`] share one
/// unit of work.
pub struct BaseAsyncRepository<E, S> {
    session: SessionHandle<S>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> BaseAsyncRepository<E, S>
where
    E: Entity,
    S: EntitySet<E>,
{
    /// Create a repository over `session`
    pub fn new(session: SessionHandle<S>) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    /// Session this repository works in
    pub fn session(&self) -> &SessionHandle<S> {
        &self.session
    }

    /// Stop tracking every instance in the session
    ///
    /// A session is one unit of work and keeps every saved instance tracked as
    /// `Unchanged`; long-lived handles call this between units of work.
    /// Returns the number of detached instances.
    pub async fn detach_all(&self) -> usize {
        let detached = self.session.lock().await.detach_all();
        tracing::debug!(entity = E::entity_name(), detached, "Detached tracked entities");
        detached
    }

    /// Wait for the session unless the token fires first
    async fn lock(
        &self,
        operation: RepositoryOperation,
        cancel: &CancellationToken,
    ) -> RepositoryResult<MutexGuard<'_, S>> {
        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(RepositoryError::cancelled(operation)),
            session = self.session.lock() => Ok(session),
        }
    }

    fn failure(&self, operation: RepositoryOperation, error: SessionError) -> RepositoryError {
        let error = RepositoryError::from_session(operation, error);
        log_failure::<E>(&error);
        error
    }

    async fn fetch(
        &self,
        operation: RepositoryOperation,
        query: Query<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<E>> {
        let session = self.lock(operation, cancel).await?;
        let rows = session
            .fetch(&query, cancel)
            .await
            .map_err(|e| self.failure(operation, e))?;
        tracing::debug!(
            entity = E::entity_name(),
            %operation,
            rows = rows.len(),
            "Fetched rows"
        );
        Ok(rows)
    }

    async fn first(
        &self,
        query: Query<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<E>> {
        let session = self.lock(RepositoryOperation::Find, cancel).await?;
        session
            .first(&query, cancel)
            .await
            .map_err(|e| self.failure(RepositoryOperation::Find, e))
    }

    async fn count_rows(&self, query: Query<E>, cancel: &CancellationToken) -> RepositoryResult<u64> {
        let session = self.lock(RepositoryOperation::Count, cancel).await?;
        session
            .count(&query, cancel)
            .await
            .map_err(|e| self.failure(RepositoryOperation::Count, e))
    }

    async fn any(&self, query: Query<E>, cancel: &CancellationToken) -> RepositoryResult<bool> {
        let session = self.lock(RepositoryOperation::Exists, cancel).await?;
        session
            .any(&query, cancel)
            .await
            .map_err(|e| self.failure(RepositoryOperation::Exists, e))
    }

    /// Attach `entity` for update or deletion, then save
    async fn mutate(
        &self,
        operation: RepositoryOperation,
        entity: E,
        cancel: &CancellationToken,
    ) -> RepositoryResult<bool> {
        let id = entity.id();
        let with_entity = |error: RepositoryError| error.with_entity(E::entity_name(), id.to_string());

        let mut session = self.lock(operation, cancel).await?;
        let mut tracker = EntityStateTracker::new(&mut *session);
        let attached = match operation {
            RepositoryOperation::Remove => tracker.attach_deleted(entity),
            _ => tracker.attach_modified(entity),
        };
        attached.map_err(|e| with_entity(self.failure(operation, e)))?;

        let affected = match session.save_changes(cancel).await {
            Ok(affected) => affected,
            Err(e) => {
                // The rejected change must not be replayed by the next save
                session.detach(id);
                return Err(with_entity(self.failure(operation, e)));
            }
        };

        tracing::debug!(
            entity = E::entity_name(),
            id,
            %operation,
            rows_affected = affected,
            "Saved changes"
        );
        Ok(affected > 0)
    }
}

fn compose<E>(predicate: Option<Predicate<E>>, pagination: Option<&PaginationSpec>) -> Query<E> {
    let query = apply_predicate(Query::all(), predicate);
    match pagination {
        Some(spec) => apply_pagination(query, spec),
        None => query,
    }
}

fn log_failure<E: Entity>(error: &RepositoryError) {
    if error.is_cancelled() {
        tracing::debug!(
            entity = E::entity_name(),
            operation = %error.operation,
            "Repository operation cancelled"
        );
    } else {
        tracing::warn!(
            entity = E::entity_name(),
            operation = %error.operation,
            kind = %error.kind,
            error = %error.message,
            "Repository operation failed"
        );
    }
}

impl<E, S> AsyncRepository<E> for BaseAsyncRepository<E, S>
where
    E: Entity,
    S: EntitySet<E>,
{
    async fn count(&self, cancel: &CancellationToken) -> RepositoryResult<u64> {
        self.count_rows(compose(None, None), cancel).await
    }

    async fn count_where(
        &self,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        self.count_rows(compose(Some(predicate), None), cancel).await
    }

    async fn create(&self, entity: E, cancel: &CancellationToken) -> RepositoryResult<E> {
        let operation = RepositoryOperation::Create;
        let mut session = self.lock(operation, cancel).await?;

        let created = EntityStateTracker::new(&mut *session)
            .attach_added(entity)
            .map_err(|e| self.failure(operation, e))?;
        let id = created.id();

        if let Err(e) = session.save_changes(cancel).await {
            session.detach(id);
            return Err(self
                .failure(operation, e)
                .with_entity(E::entity_name(), id.to_string()));
        }

        tracing::debug!(entity = E::entity_name(), id, "Created entity");
        Ok(created)
    }

    async fn update(&self, entity: E, cancel: &CancellationToken) -> RepositoryResult<bool> {
        self.mutate(RepositoryOperation::Update, entity, cancel).await
    }

    async fn remove(&self, entity: E, cancel: &CancellationToken) -> RepositoryResult<bool> {
        self.mutate(RepositoryOperation::Remove, entity, cancel).await
    }

    async fn find_all_paged(
        &self,
        pagination: &PaginationSpec,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<E>> {
        let query = compose(None, Some(pagination));
        self.fetch(RepositoryOperation::FindAllPaged, query, cancel).await
    }

    async fn find_all_paged_where(
        &self,
        pagination: &PaginationSpec,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<E>> {
        let query = compose(Some(predicate), Some(pagination));
        self.fetch(RepositoryOperation::FindAllPaged, query, cancel).await
    }

    async fn find_all(&self, cancel: &CancellationToken) -> RepositoryResult<Vec<E>> {
        self.fetch(RepositoryOperation::FindAll, compose(None, None), cancel)
            .await
    }

    async fn find_all_where(
        &self,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<E>> {
        self.fetch(RepositoryOperation::FindAll, compose(Some(predicate), None), cancel)
            .await
    }

    async fn find(&self, id: i64, cancel: &CancellationToken) -> RepositoryResult<Option<E>> {
        self.first(compose(Some(Predicate::by_id(id)), None), cancel)
            .await
            .map_err(|e| e.with_entity(E::entity_name(), id.to_string()))
    }

    async fn find_by_uuid(&self, uuid: Uuid, cancel: &CancellationToken) -> RepositoryResult<Option<E>> {
        self.first(compose(Some(Predicate::by_uuid(uuid)), None), cancel)
            .await
            .map_err(|e| e.with_entity(E::entity_name(), uuid.to_string()))
    }

    async fn find_where(
        &self,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<E>> {
        self.first(compose(Some(predicate), None), cancel).await
    }

    async fn exists(&self, id: i64, cancel: &CancellationToken) -> RepositoryResult<bool> {
        self.any(compose(Some(Predicate::by_id(id)), None), cancel)
            .await
            .map_err(|e| e.with_entity(E::entity_name(), id.to_string()))
    }

    async fn exists_by_uuid(&self, uuid: Uuid, cancel: &CancellationToken) -> RepositoryResult<bool> {
        self.any(compose(Some(Predicate::by_uuid(uuid)), None), cancel)
            .await
            .map_err(|e| e.with_entity(E::entity_name(), uuid.to_string()))
    }

    async fn exists_where(
        &self,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<bool> {
        self.any(compose(Some(predicate), None), cancel).await
    }
}

impl<E, S> Clone for BaseAsyncRepository<E, S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity, S> fmt::Debug for BaseAsyncRepository<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseAsyncRepository")
            .field("entity", &E::entity_name())
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;
    use crate::entity::fixtures::{
        user_1, user_2, user_3, user_4, User, ID_DEV_1, ID_DEV_2, ID_DEV_3, NAME_DEV_4, UUID_DEV_1,
        UUID_DEV_2, UUID_DEV_4,
    };
    use crate::repository::RepositoryErrorKind;
    use crate::store::memory::{InMemorySession, InMemoryStore};
    use crate::store::{EntityState, SessionFactory};

    type UserRepository = BaseAsyncRepository<User, InMemorySession<User>>;

    async fn repository() -> (InMemoryStore<User>, UserRepository) {
        let store = InMemoryStore::new();
        store.seed([user_1(), user_2(), user_3()]).await.unwrap();
        let repository = BaseAsyncRepository::new(SessionHandle::open(&store));
        (store, repository)
    }

    fn new_user() -> User {
        let mut user = user_4();
        user.id = 0;
        user
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();

        let created = repo.create(new_user(), &cancel).await.unwrap();

        assert_ne!(created.id, 0);
        assert!(repo.exists(created.id, &cancel).await.unwrap());
        assert_eq!(repo.find(created.id, &cancel).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_create_discards_supplied_id() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let mut supplied = user_4();
        supplied.id = ID_DEV_1;

        let created = repo.create(supplied, &cancel).await.unwrap();

        assert_ne!(created.id, ID_DEV_1);
        assert_eq!(repo.count(&cancel).await.unwrap(), 4);
        assert_eq!(repo.find(ID_DEV_1, &cancel).await.unwrap(), Some(user_1()));
    }

    #[tokio::test]
    async fn test_create_duplicate_uuid_is_constraint_violation() {
        let (store, repo) = repository().await;
        let mut duplicate = new_user();
        duplicate.uuid = UUID_DEV_1;

        let error = repo
            .create(duplicate, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(error.kind, RepositoryErrorKind::ConstraintViolation);
        assert_eq!(error.operation, RepositoryOperation::Create);
        assert_eq!(error.entity_type.as_deref(), Some("User"));
        assert!(error.is_persistence());
        assert!(error.source().is_some());
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_update_then_find_returns_new_value() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let mut edited = user_2();
        edited.name = NAME_DEV_4.to_string();
        edited.active = false;

        assert!(repo.update(edited.clone(), &cancel).await.unwrap());
        assert_eq!(repo.find(ID_DEV_2, &cancel).await.unwrap(), Some(edited));
    }

    #[tokio::test]
    async fn test_update_same_identity_twice_in_one_session() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let mut first = user_1();
        first.name = "First".to_string();
        let mut second = user_1();
        second.name = "Second".to_string();

        assert!(repo.update(first, &cancel).await.unwrap());
        assert!(repo.update(second.clone(), &cancel).await.unwrap());
        assert_eq!(repo.find(ID_DEV_1, &cancel).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_update_missing_row_returns_false() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let mut ghost = user_4();
        ghost.id = 99;

        assert!(!repo.update(ghost.clone(), &cancel).await.unwrap());
        assert!(!repo.exists(99, &cancel).await.unwrap());
        // Unmatched rows are not left attached
        assert!(!repo.update(ghost, &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_then_exists_is_false() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let before = repo.count(&cancel).await.unwrap();

        assert!(repo.remove(user_2(), &cancel).await.unwrap());

        assert!(!repo.exists(ID_DEV_2, &cancel).await.unwrap());
        assert!(!repo.exists_by_uuid(UUID_DEV_2, &cancel).await.unwrap());
        assert_eq!(repo.count(&cancel).await.unwrap(), before - 1);
    }

    #[tokio::test]
    async fn test_remove_missing_row_returns_false() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        assert!(repo.remove(user_3(), &cancel).await.unwrap());
        assert!(!repo.remove(user_3(), &cancel).await.unwrap());
        assert_eq!(repo.count(&cancel).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_remove_after_update_reconciles() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let mut edited = user_3();
        edited.email = "changed@example.com".to_string();

        assert!(repo.update(edited, &cancel).await.unwrap());
        assert!(repo.remove(user_3(), &cancel).await.unwrap());

        let session = repo.session().lock().await;
        assert_eq!(session.tracked_state(ID_DEV_3), None);
        assert_eq!(session.tracked().len(), 0);
    }

    #[tokio::test]
    async fn test_find_all_paged_single_page() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let first = PaginationSpec::first_page(3).unwrap();

        let page = repo.find_all_paged(&first, &cancel).await.unwrap();
        assert_eq!(page, vec![user_1(), user_2(), user_3()]);

        let past_end = repo.find_all_paged(&first.next(), &cancel).await.unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_find_all_paged_windows_in_store_order() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();

        let page = repo
            .find_all_paged(&PaginationSpec::new(2, 2).unwrap(), &cancel)
            .await
            .unwrap();
        assert_eq!(page, vec![user_3()]);
    }

    #[tokio::test]
    async fn test_find_all_paged_where_filters_before_window() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let not_first = Predicate::new(|u: &User| u.id != ID_DEV_1);

        let page = repo
            .find_all_paged_where(&PaginationSpec::first_page(1).unwrap(), not_first, &cancel)
            .await
            .unwrap();
        assert_eq!(page, vec![user_2()]);
    }

    #[tokio::test]
    async fn test_predicate_variants_never_return_failing_rows() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let odd = || Predicate::new(|u: &User| u.id % 2 == 1);

        let all = repo.find_all_where(odd(), &cancel).await.unwrap();
        assert!(all.iter().all(|u| u.id % 2 == 1));
        assert_eq!(all.len(), 2);

        let paged = repo
            .find_all_paged_where(&PaginationSpec::first_page(1).unwrap(), odd(), &cancel)
            .await
            .unwrap();
        assert_eq!(paged, vec![user_1()]);

        assert_eq!(repo.count_where(odd(), &cancel).await.unwrap(), 2);
        assert!(repo.exists_where(odd(), &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_where_returns_first_match() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();

        let found = repo
            .find_where(Predicate::new(|u: &User| u.active), &cancel)
            .await
            .unwrap();
        assert_eq!(found, Some(user_1()));
    }

    #[tokio::test]
    async fn test_find_by_uuid() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();

        assert_eq!(
            repo.find_by_uuid(UUID_DEV_1, &cancel).await.unwrap(),
            Some(user_1())
        );
        assert_eq!(repo.find_by_uuid(UUID_DEV_4, &cancel).await.unwrap(), None);
        assert!(!repo.exists_by_uuid(UUID_DEV_4, &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_reads_do_not_track() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();

        repo.find_all(&cancel).await.unwrap();
        repo.find(ID_DEV_1, &cancel).await.unwrap();
        repo.exists(ID_DEV_2, &cancel).await.unwrap();

        let session = repo.session().lock().await;
        assert!(session.tracked().is_empty());
    }

    #[tokio::test]
    async fn test_three_user_scenario() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();

        assert_eq!(
            repo.count_where(Predicate::new(|u: &User| u.id < 3), &cancel)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            repo.find_where(Predicate::new(|u: &User| u.id == 5), &cancel)
                .await
                .unwrap(),
            None
        );
        assert!(repo.exists(ID_DEV_2, &cancel).await.unwrap());

        assert!(repo.remove(user_3(), &cancel).await.unwrap());
        assert_eq!(repo.count(&cancel).await.unwrap(), 2);
        assert_eq!(repo.find(ID_DEV_3, &cancel).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancelled_token_fails_every_operation() {
        let (store, repo) = repository().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = repo.count(&cancel).await.unwrap_err();
        assert_eq!(error.kind, RepositoryErrorKind::Cancelled);
        assert_eq!(error.operation, RepositoryOperation::Count);

        let error = repo.create(new_user(), &cancel).await.unwrap_err();
        assert!(error.is_cancelled());
        assert!(!error.is_persistence());

        let error = repo.remove(user_1(), &cancel).await.unwrap_err();
        assert_eq!(error.operation, RepositoryOperation::Remove);
        assert!(error.is_cancelled());

        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_session() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let held = repo.session().lock().await;

        let pending = {
            let repo = repo.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { repo.find_all(&cancel).await })
        };
        cancel.cancel();

        let error = pending.await.unwrap().unwrap_err();
        assert!(error.is_cancelled());
        drop(held);
    }

    #[tokio::test]
    async fn test_unavailable_store_is_retriable_persistence_error() {
        let (store, repo) = repository().await;
        store.set_available(false);

        let error = repo
            .update(user_1(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(error.kind, RepositoryErrorKind::ConnectionFailed);
        assert!(error.is_persistence());
        assert!(error.is_retriable());
        assert_eq!(error.entity_id.as_deref(), Some("1"));
        assert!(matches!(error.cause, Some(SessionError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_failed_create_does_not_poison_later_writes() {
        let (store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let mut duplicate = new_user();
        duplicate.uuid = UUID_DEV_1;

        let error = repo.create(duplicate, &cancel).await.unwrap_err();
        assert_eq!(error.kind, RepositoryErrorKind::ConstraintViolation);
        assert!(!repo.session().lock().await.tracked().has_changes());

        let mut edited = user_2();
        edited.name = NAME_DEV_4.to_string();
        assert!(repo.update(edited.clone(), &cancel).await.unwrap());
        assert_eq!(repo.find(ID_DEV_2, &cancel).await.unwrap(), Some(edited));

        let created = repo.create(new_user(), &cancel).await.unwrap();
        assert_eq!(repo.find_by_uuid(UUID_DEV_4, &cancel).await.unwrap(), Some(created));
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_failed_update_is_not_replayed() {
        let (store, repo) = repository().await;
        let cancel = CancellationToken::new();
        let mut edited = user_1();
        edited.name = NAME_DEV_4.to_string();

        store.set_available(false);
        assert!(repo.update(edited, &cancel).await.is_err());
        store.set_available(true);

        assert!(repo.remove(user_2(), &cancel).await.unwrap());
        assert_eq!(repo.find(ID_DEV_1, &cancel).await.unwrap(), Some(user_1()));
        assert!(!repo.exists(ID_DEV_2, &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_detach_all_clears_tracked_set() {
        let (_store, repo) = repository().await;
        let cancel = CancellationToken::new();

        assert!(repo.update(user_1(), &cancel).await.unwrap());
        assert!(repo.update(user_3(), &cancel).await.unwrap());
        assert_eq!(repo.session().lock().await.tracked().len(), 2);

        assert_eq!(repo.detach_all().await, 2);
        assert!(repo.session().lock().await.tracked().is_empty());
        assert_eq!(repo.detach_all().await, 0);
        assert_eq!(repo.count(&cancel).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_repositories_on_one_handle_share_unit_of_work() {
        let (store, repo) = repository().await;
        let other: UserRepository = BaseAsyncRepository::new(repo.session().clone());
        let cancel = CancellationToken::new();

        assert!(repo.update(user_1(), &cancel).await.unwrap());
        {
            let session = other.session().lock().await;
            assert_eq!(session.tracked_state(ID_DEV_1), Some(EntityState::Unchanged));
        }

        let fresh: UserRepository = BaseAsyncRepository::new(SessionHandle::new(store.create_session()));
        let session = fresh.session().lock().await;
        assert!(session.tracked().is_empty());
    }
}
