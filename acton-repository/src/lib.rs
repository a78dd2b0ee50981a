//! # acton-repository
//!
//! Generic asynchronous data access for Rust services: one repository contract
//! for CRUD, counting, existence checks and paged/filtered retrieval over any
//! storage session, plus a field mapper for turning entities into transport
//! objects.
//!
//! ## Features
//!
//! - **Generic repositories**: [`AsyncRepository`](repository::AsyncRepository) over any
//!   [`Entity`](entity::Entity), implemented once by
//!   [`BaseAsyncRepository`](repository::BaseAsyncRepository)
//! - **Units of work**: sessions track changes and commit them with one atomic save
//! - **Identity reconciliation**: stale tracked copies are detached before updates and removals
//! - **Query composition**: predicates and pagination windows, filtered before sliced
//! - **Cancellation**: every operation takes a `CancellationToken`
//! - **Field mapping**: same-name convention with rename/compute/ignore overrides
//! - **In-memory store**: a complete storage engine for tests and prototypes
//!
//! ## Example
//!
//! ```rust,no_run
//! use acton_repository::prelude::*;
//! use serde::{Deserialize, Serialize};
//! use uuid::Uuid;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct User {
//!     id: i64,
//!     uuid: Uuid,
//!     name: String,
//! }
//!
//! impl Entity for User {
//!     fn id(&self) -> i64 {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: i64) {
//!         self.id = id;
//!     }
//!
//!     fn uuid(&self) -> Uuid {
//!         self.uuid
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     let store = InMemoryStore::<User>::from_config(&config.store);
//!     let users: BaseAsyncRepository<User, _> = BaseAsyncRepository::new(SessionHandle::open(&store));
//!     let cancel = CancellationToken::new();
//!
//!     let alice = users
//!         .create(User { id: 0, uuid: Uuid::new_v4(), name: "Alice".into() }, &cancel)
//!         .await?;
//!     assert!(users.exists(alice.id, &cancel).await?);
//!
//!     let page = config.pagination.resolve(Some(1), None)?;
//!     let first_page = users.find_all_paged(&page, &cancel).await?;
//!     assert_eq!(first_page.len(), 1);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod mapper;
pub mod observability;
pub mod repository;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, PaginationConfig, ServiceConfig, StoreConfig};
    pub use crate::entity::{Entity, TRANSIENT_ID};
    pub use crate::error::{Error, Result};

    pub use crate::mapper::{FieldMapper, FieldMapperBuilder, Mapper, MappingError, MappingRule};

    pub use crate::observability::init_tracing;

    pub use crate::repository::query::{apply_pagination, apply_predicate};
    pub use crate::repository::{
        AsyncRepository, BaseAsyncRepository, EntityStateTracker, PaginationSpec, Predicate,
        Query, RepositoryError, RepositoryErrorKind, RepositoryOperation, RepositoryResult,
    };

    pub use crate::store::memory::{InMemorySession, InMemoryStore};
    pub use crate::store::{
        EntitySet, EntityState, SessionError, SessionFactory, SessionHandle, StorageSession,
    };

    // Re-export the cancellation signal every operation takes
    pub use tokio_util::sync::CancellationToken;
}
