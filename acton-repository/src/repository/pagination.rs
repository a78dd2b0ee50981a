//! Pagination spec for repository queries
//!
//! A [`PaginationSpec`] is a validated, immutable page request. It is turned
//! into a skip/take window when the query is composed:
//!
//! ```text
//! skip = (page_number - 1) * page_size
//! take = page_size
//! ```
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::PaginationSpec;
//!
//! let page3 = PaginationSpec::new(3, 20).unwrap();
//! assert_eq!(page3.skip(), 40);
//! assert_eq!(page3.take(), 20);
//!
//! assert!(PaginationSpec::new(0, 20).is_err());
//! assert!(PaginationSpec::new(1, 0).is_err());
//! ```

use super::error::{RepositoryError, RepositoryOperation};
use super::traits::RepositoryResult;

/// Validated page request (1-based page number, non-zero page size)
///
/// Pages past the end of the data are valid and select nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaginationSpec {
    page_number: u64,
    page_size: u64,
}

impl PaginationSpec {
    /// Create a page request
    ///
    /// # Errors
    ///
    /// Returns a validation error when `page_number < 1` or `page_size == 0`.
    pub fn new(page_number: u64, page_size: u64) -> RepositoryResult<Self> {
        if page_number < 1 {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::FindAllPaged,
                format!("page_number must be >= 1, got {page_number}"),
            ));
        }
        if page_size == 0 {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::FindAllPaged,
                "page_size must be > 0",
            ));
        }
        Ok(Self {
            page_number,
            page_size,
        })
    }

    /// First page with the given size
    ///
    /// # Errors
    ///
    /// Returns a validation error when `page_size == 0`.
    pub fn first_page(page_size: u64) -> RepositoryResult<Self> {
        Self::new(1, page_size)
    }

    /// 1-based page number
    #[must_use]
    pub const fn page_number(&self) -> u64 {
        self.page_number
    }

    /// Maximum number of rows on the page
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of rows to skip
    #[must_use]
    pub const fn skip(&self) -> u64 {
        (self.page_number - 1).saturating_mul(self.page_size)
    }

    /// Number of rows to take
    #[must_use]
    pub const fn take(&self) -> u64 {
        self.page_size
    }

    /// Spec for the following page
    #[must_use]
    pub const fn next(&self) -> Self {
        Self {
            page_number: self.page_number.saturating_add(1),
            page_size: self.page_size,
        }
    }
}
