//! Entity capability trait
//!
//! Every type persisted through a repository carries two identities:
//!
//! - an `i64` surrogate key assigned by the store (`0` until persisted)
//! - a [`Uuid`] that is stable for the lifetime of the record and safe to expose
//!   outside the service
//!
//! # Example
//!
//! ```rust
//! use acton_repository::entity::Entity;
//! use uuid::Uuid;
//!
//! #[derive(Debug, Clone, PartialEq)]
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
//! let user = User { id: 0, uuid: Uuid::new_v4(), name: "Alice".into() };
//! assert!(user.is_transient());
//! ```

use uuid::Uuid;

/// Identity value used for entities that have not been persisted yet
pub const TRANSIENT_ID: i64 = 0;

/// Capability set required from every persisted record
///
/// Implementations must keep `id` immutable once the store has assigned it.
/// Repositories only call [`Entity::set_id`] while attaching a new record.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Store-assigned surrogate key, [`TRANSIENT_ID`] when not yet persisted
    fn id(&self) -> i64;

    /// Overwrite the surrogate key
    fn set_id(&mut self, id: i64);

    /// Stable external identifier
    fn uuid(&self) -> Uuid;

    /// Whether the entity has never been persisted
    fn is_transient(&self) -> bool {
        self.id() == TRANSIENT_ID
    }

    /// Short type name used in logs and error context
    fn entity_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        let path = full.split('<').next().unwrap_or(full);
        path.rsplit("::").next().unwrap_or(path)
    }
}
