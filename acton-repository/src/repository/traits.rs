//! Repository trait definitions
//!
//! This module provides the generic asynchronous repository contract using
//! RPITIT (Return Position Impl Trait In Traits), available since Rust 1.75.
//!
//! Every operation takes a [`CancellationToken`] as its last argument. If the
//! token fires before the store call completes the operation fails with
//! [`RepositoryErrorKind::Cancelled`](super::RepositoryErrorKind::Cancelled).
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_repository::repository::{AsyncRepository, Predicate};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let created = users.create(new_user, &cancel).await?;
//! assert!(users.exists(created.id(), &cancel).await?);
//!
//! let active = users
//!     .count_where(Predicate::new(|u: &User| u.active), &cancel)
//!     .await?;
//! ```

use std::future::Future;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::RepositoryError;
use super::pagination::PaginationSpec;
use super::query::Predicate;
use crate::entity::Entity;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Generic asynchronous CRUD and query contract over one entity type
///
/// Lookups never fail for missing rows: they return `None`, `false` or an
/// empty list. Mutations make a single attempt; store failures propagate as
/// persistence errors.
///
/// # Example
///
/// ```rust,ignore
/// use acton_repository::repository::{AsyncRepository, PaginationSpec};
///
/// let page = PaginationSpec::new(2, 20)?;
/// let users = repo.find_all_paged(&page, &cancel).await?;
/// ```
pub trait AsyncRepository<E: Entity>: Send + Sync {
    /// Number of rows
    fn count(&self, cancel: &CancellationToken)
        -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Number of rows matching `predicate`
    fn count_where(
        &self,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Insert `entity` as a new row
    ///
    /// Any supplied id is discarded; the returned entity carries the id the
    /// store assigned.
    fn create(
        &self,
        entity: E,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Overwrite the row with `entity`'s id
    ///
    /// Returns `false` when no row was affected.
    fn update(
        &self,
        entity: E,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Delete the row with `entity`'s id
    ///
    /// Returns `false` when no row was affected.
    fn remove(
        &self,
        entity: E,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// One page of rows, in store order
    ///
    /// Pages past the end return an empty list.
    fn find_all_paged(
        &self,
        pagination: &PaginationSpec,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// One page of the rows matching `predicate`
    fn find_all_paged_where(
        &self,
        pagination: &PaginationSpec,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// Every row, in store order
    fn find_all(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// Every row matching `predicate`
    fn find_all_where(
        &self,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// Row with surrogate key `id`
    fn find(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Row with external identifier `uuid`
    fn find_by_uuid(
        &self,
        uuid: Uuid,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// First row matching `predicate`, in store order
    fn find_where(
        &self,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Whether a row with surrogate key `id` exists
    fn exists(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Whether a row with external identifier `uuid` exists
    fn exists_by_uuid(
        &self,
        uuid: Uuid,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Whether any row matches `predicate`
    fn exists_where(
        &self,
        predicate: Predicate<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<bool>> + Send;
}
