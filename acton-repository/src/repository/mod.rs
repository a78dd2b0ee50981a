//! Generic asynchronous repositories
//!
//! This module provides the repository contract and its session-backed
//! implementation, enabling a consistent data-access interface for every
//! entity type regardless of the storage engine behind the session.
//!
//! # Features
//!
//! - **Generic CRUD**: [`AsyncRepository`] trait for create, read, update, remove,
//!   count and existence checks
//! - **Base implementation**: [`BaseAsyncRepository`] over any [`EntitySet`](crate::store::EntitySet)
//! - **Identity reconciliation**: [`EntityStateTracker`] keeps one tracked instance per id
//! - **Filtering**: [`Predicate`] combinators and [`query::apply_predicate`]
//! - **Pagination**: [`PaginationSpec`] and [`query::apply_pagination`]
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_repository::repository::{AsyncRepository, BaseAsyncRepository, PaginationSpec, Predicate};
//! use acton_repository::store::{memory::InMemoryStore, SessionHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = InMemoryStore::<User>::new();
//! let users = BaseAsyncRepository::new(SessionHandle::open(&store));
//! let cancel = CancellationToken::new();
//!
//! let alice = users.create(User::new("alice"), &cancel).await?;
//! let page = users
//!     .find_all_paged_where(
//!         &PaginationSpec::first_page(20)?,
//!         Predicate::new(|u: &User| u.active),
//!         &cancel,
//!     )
//!     .await?;
//! ```

mod base;
mod error;
mod pagination;
pub mod query;
mod tracker;
mod traits;

// Re-export all public types
pub use base::BaseAsyncRepository;
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use pagination::PaginationSpec;
pub use query::{Predicate, Query};
pub use tracker::{EntityStateTracker, Reconciliation};
pub use traits::{AsyncRepository, RepositoryResult};
