mod api_keys;
mod completions;
mod embeddings;
mod logs;
mod models;
mod providers;

pub use api_keys::*;
use chrono::{DateTime, Utc};
pub use completions::*;
pub use embeddings::*;
pub use logs::*;
pub use models::*;
pub use providers::*;

/// Default page size for list queries.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Upper bound on page size for list queries.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending order (oldest first)
    Asc,
    /// Descending order (newest first)
    #[default]
    Desc,
}

impl SortOrder {
    /// Get the SQL ORDER BY direction string.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Listing parameters. Ids are monotonically assigned, so ordering by id is
/// ordering by insertion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListParams {
    /// Maximum number of records to return.
    pub limit: Option<i64>,
    pub sort_order: SortOrder,
}

impl ListParams {
    /// Effective limit, clamped to `1..=MAX_LIST_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Everything up to now.
    pub fn all_time() -> Self {
        Self {
            start: DateTime::<Utc>::UNIX_EPOCH,
            end: Utc::now() + chrono::Duration::days(1),
        }
    }
}
