//! Core data model: `Domain`, `Snapshot`, `ListingRow`, and the small enums
//! that parameterize the harvest channels and query shapes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A canonical listing identity, created once on first sighting and never
/// renumbered so diffs/history stay stable across re-ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: i64,
    pub name: String,
    pub length: i32,
}

impl Domain {
    /// Lowercase, trim, and compute `length` from the first dot-separated
    /// label, matching the upstream's own normalization.
    pub fn normalize_name(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    pub fn label_length(name: &str) -> i32 {
        name.split('.').next().map(str::len).unwrap_or(name.len()) as i32
    }
}

/// One completed harvest (or externally imported dump).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub row_count: i64,
}

/// A `(snapshot, domain)` fact. `domain` is a denormalized copy of
/// `Domain::name` kept for fast filter-by-name queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRow {
    pub snapshot_id: i64,
    pub domain_id: i64,
    pub domain: String,
    pub price_usd: Option<Decimal>,
    pub length: i32,
}

/// The four server-side orderings ("channels") a stream races through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ordering {
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl Ordering {
    pub const ALL: [Ordering; 4] = [
        Ordering::PriceAsc,
        Ordering::PriceDesc,
        Ordering::NameAsc,
        Ordering::NameDesc,
    ];

    /// The literal value sent as the upstream `sort` query parameter.
    pub fn as_query_value(self) -> &'static str {
        match self {
            Ordering::PriceAsc => "PriceAsc",
            Ordering::PriceDesc => "PriceDesc",
            Ordering::NameAsc => "NameAsc",
            Ordering::NameDesc => "NameDesc",
        }
    }
}

impl std::fmt::Display for Ordering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_query_value())
    }
}

/// Search mode for the paginated browse query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Prefix,
    Exact,
    Contains,
}

/// Sortable columns for the paginated browse query. Unknown input falls
/// back to `Domain` at the call site, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Domain,
    PriceUsd,
    Length,
}

impl SortColumn {
    pub fn from_str_or_domain(s: &str) -> Self {
        match s {
            "price_usd" => SortColumn::PriceUsd,
            "length" => SortColumn::Length,
            _ => SortColumn::Domain,
        }
    }

    pub fn column_name(self) -> &'static str {
        match self {
            SortColumn::Domain => "domain",
            SortColumn::PriceUsd => "price_usd",
            SortColumn::Length => "length",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_str_or_asc(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "desc" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn sql_keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Filter for the diff query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    All,
    New,
    Deleted,
    Changed,
}

/// Row classification produced by the diff query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffStatus {
    New,
    Deleted,
    Changed,
    Unchanged,
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiffStatus::New => "NEW",
            DiffStatus::Deleted => "DELETED",
            DiffStatus::Changed => "CHANGED",
            DiffStatus::Unchanged => "UNCHANGED",
        };
        write!(f, "{s}")
    }
}

/// Per-snapshot status computed while scanning a domain's history in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryStatus {
    New,
    Deleted,
    Changed,
    Unchanged,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRow {
    pub domain_id: i64,
    pub domain: String,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    pub status: DiffStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub snapshot_id: i64,
    pub snapshot_name: String,
    pub created_at: DateTime<Utc>,
    pub price_usd: Option<Decimal>,
    pub status: HistoryStatus,
}

/// A generic `(rows, total_count, elapsed_ms)` envelope shared by every
/// query shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    pub rows: Vec<T>,
    pub total_count: i64,
    pub elapsed_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_mixed_case_and_whitespace() {
        assert_eq!(Domain::normalize_name("  Foo.COM "), "foo.com");
    }

    #[test]
    fn label_length_counts_first_label() {
        assert_eq!(Domain::label_length("foo.com"), 3);
        assert_eq!(Domain::label_length("ab.co.uk"), 2);
        assert_eq!(Domain::label_length("nodotatall"), 10);
    }

    #[test]
    fn sort_column_falls_back_to_domain() {
        assert_eq!(SortColumn::from_str_or_domain("bogus"), SortColumn::Domain);
        assert_eq!(SortColumn::from_str_or_domain("length"), SortColumn::Length);
    }

    #[test]
    fn sort_direction_falls_back_to_asc() {
        assert_eq!(SortDirection::from_str_or_asc("bogus"), SortDirection::Asc);
        assert_eq!(SortDirection::from_str_or_asc("DESC"), SortDirection::Desc);
    }
}
