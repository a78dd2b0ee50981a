//! Query composition
//!
//! A [`Query`] describes which rows of one entity type a store call should
//! touch: zero or more [`Predicate`]s plus an optional skip/take window. The
//! free functions [`apply_predicate`] and [`apply_pagination`] build queries
//! without knowing anything about the store that will run them.
//!
//! Evaluation order is fixed: every predicate is applied first, then the
//! window. A window applied before a predicate still slices the filtered rows,
//! which keeps results identical across store query optimizers.
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::query::{apply_pagination, apply_predicate, Predicate, Query};
//! use acton_repository::repository::PaginationSpec;
//!
//! let evens = Predicate::new(|n: &i64| n % 2 == 0);
//! let page = PaginationSpec::new(2, 2).unwrap();
//! let query = apply_pagination(apply_predicate(Query::all(), Some(evens)), &page);
//!
//! let rows: Vec<i64> = (1..=10).collect();
//! let selected: Vec<i64> = query.evaluate(rows.iter()).copied().collect();
//! assert_eq!(selected, vec![6, 8]);
//! ```

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::pagination::PaginationSpec;
use crate::entity::Entity;

/// Boolean filter over a single entity type
///
/// Cheap to clone; the closure is shared.
pub struct Predicate<E> {
    test: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E> Predicate<E> {
    /// Wrap a closure as a predicate
    pub fn new<F>(test: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            test: Arc::new(test),
        }
    }

    /// Evaluate the predicate against one row
    pub fn matches(&self, entity: &E) -> bool {
        (self.test)(entity)
    }
}

impl<E: 'static> Predicate<E> {
    /// Rows matching both predicates
    #[must_use]
    pub fn and(self, other: Predicate<E>) -> Self {
        Self::new(move |entity| self.matches(entity) && other.matches(entity))
    }

    /// Rows matching either predicate
    #[must_use]
    pub fn or(self, other: Predicate<E>) -> Self {
        Self::new(move |entity| self.matches(entity) || other.matches(entity))
    }

    /// Rows not matching this predicate
    #[must_use]
    pub fn negate(self) -> Self {
        Self::new(move |entity| !self.matches(entity))
    }
}

impl<E: Entity> Predicate<E> {
    /// Rows whose surrogate key equals `id`
    pub fn by_id(id: i64) -> Self {
        Self::new(move |entity: &E| entity.id() == id)
    }

    /// Rows whose external identifier equals `uuid`
    pub fn by_uuid(uuid: Uuid) -> Self {
        Self::new(move |entity: &E| entity.uuid() == uuid)
    }
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self {
            test: Arc::clone(&self.test),
        }
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// Skip/take slice applied after filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Rows to skip
    pub skip: u64,
    /// Maximum rows to return
    pub take: u64,
}

impl Window {
    /// Narrow this window by a page taken relative to it
    fn narrow(self, inner: Window) -> Window {
        Window {
            skip: self.skip.saturating_add(inner.skip),
            take: inner.take.min(self.take.saturating_sub(inner.skip)),
        }
    }
}

/// Description of the rows a store call should touch
pub struct Query<E> {
    predicates: Vec<Predicate<E>>,
    window: Option<Window>,
}

impl<E> Query<E> {
    /// Every row, in store order
    pub fn all() -> Self {
        Self {
            predicates: Vec::new(),
            window: None,
        }
    }

    /// Predicates applied by this query, in composition order
    pub fn predicates(&self) -> &[Predicate<E>] {
        &self.predicates
    }

    /// Window applied after filtering, if any
    pub fn window(&self) -> Option<Window> {
        self.window
    }

    /// Whether a row passes every predicate
    pub fn matches(&self, entity: &E) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(entity))
    }

    /// Run the query over rows that are already in store order
    ///
    /// In-memory stores use this directly; other stores translate
    /// [`Query::predicates`] and [`Query::window`] into their own calls.
    pub fn evaluate<'a, I>(&'a self, rows: I) -> impl Iterator<Item = &'a E> + 'a
    where
        I: IntoIterator<Item = &'a E>,
        I::IntoIter: 'a,
    {
        let (skip, take) = match self.window {
            Some(window) => (to_usize(window.skip), to_usize(window.take)),
            None => (0, usize::MAX),
        };
        rows.into_iter()
            .filter(move |entity| self.matches(entity))
            .skip(skip)
            .take(take)
    }
}

impl<E> Default for Query<E> {
    fn default() -> Self {
        Self::all()
    }
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            window: self.window,
        }
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("predicates", &self.predicates.len())
            .field("window", &self.window)
            .finish()
    }
}

/// Narrow a query with an optional predicate
///
/// `None` returns the query unchanged.
pub fn apply_predicate<E>(mut query: Query<E>, predicate: Option<Predicate<E>>) -> Query<E> {
    if let Some(predicate) = predicate {
        query.predicates.push(predicate);
    }
    query
}

/// Restrict a query to the window described by `spec`
///
/// Applying a second page to an already paged query selects the page inside
/// the existing window.
pub fn apply_pagination<E>(mut query: Query<E>, spec: &PaginationSpec) -> Query<E> {
    let page = Window {
        skip: spec.skip(),
        take: spec.take(),
    };
    query.window = Some(match query.window {
        Some(outer) => outer.narrow(page),
        None => page,
    });
    query
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
