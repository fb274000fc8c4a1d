//! Query Engine: paginated browse, diff, history. Grounded on
//! `original_source/backend/main.py`'s `get_rows`/`get_diff`/
//! `get_domain_history` endpoint bodies, minus the FastAPI binding (kept in
//! `crate::control`).
//!
//! Prices round-trip through SQL as `VARCHAR` rather than a native
//! `rust_decimal` binding: the installed `duckdb` feature set isn't known to
//! carry a `rust_decimal` `ToSql`/`FromSql` impl, and `DECIMAL(12,2)` casts
//! to/from text losslessly, so this sidesteps the question entirely.

use std::time::Instant;

use duckdb::types::Value;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::QueryError;
use crate::model::{
    DiffRow, DiffStatus, DiffType, HistoryEntry, HistoryStatus, ListingRow, QueryResult,
    SearchMode, SortColumn, SortDirection,
};

use super::Store;

fn decimal_from_value(value: Value) -> Result<Option<Decimal>, QueryError> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) if s.is_empty() => Ok(None),
        Value::Text(s) => Decimal::from_str(&s)
            .map(Some)
            .map_err(|_| QueryError::InvalidDecimal(s)),
        other => Err(QueryError::InvalidDecimal(format!("{other:?}"))),
    }
}

pub struct BrowseParams<'a> {
    pub snapshot_id: i64,
    pub search_mode: Option<SearchMode>,
    pub search_term: Option<&'a str>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_length: Option<i32>,
    pub max_length: Option<i32>,
    pub sort_column: SortColumn,
    pub sort_direction: SortDirection,
    pub limit: i64,
    pub offset: i64,
}

impl Store {
    /// Browse one snapshot. Count and data queries
    /// share the same WHERE clause so `total_count` always matches the
    /// filter the caller applied.
    pub async fn query_rows(
        &self,
        params: BrowseParams<'_>,
    ) -> Result<QueryResult<ListingRow>, QueryError> {
        let started = Instant::now();
        let conn = self.conn().lock_owned().await;

        let mut clauses = vec!["snapshot_id = ?".to_string()];
        let mut args: Vec<Box<dyn duckdb::ToSql>> = vec![Box::new(params.snapshot_id)];

        if let (Some(mode), Some(term)) = (params.search_mode, params.search_term) {
            let pattern = match mode {
                SearchMode::Prefix => format!("{}%", term.to_lowercase()),
                SearchMode::Exact => term.to_lowercase(),
                SearchMode::Contains => format!("%{}%", term.to_lowercase()),
            };
            if mode == SearchMode::Exact {
                clauses.push("LOWER(domain) = ?".to_string());
            } else {
                clauses.push("LOWER(domain) LIKE ?".to_string());
            }
            args.push(Box::new(pattern));
        }
        if let Some(min_price) = params.min_price {
            clauses.push("price_usd >= CAST(? AS DECIMAL(12,2))".to_string());
            args.push(Box::new(min_price.to_string()));
        }
        if let Some(max_price) = params.max_price {
            clauses.push("price_usd <= CAST(? AS DECIMAL(12,2))".to_string());
            args.push(Box::new(max_price.to_string()));
        }
        if let Some(min_length) = params.min_length {
            clauses.push("length >= ?".to_string());
            args.push(Box::new(min_length));
        }
        if let Some(max_length) = params.max_length {
            clauses.push("length <= ?".to_string());
            args.push(Box::new(max_length));
        }

        let where_clause = clauses.join(" AND ");
        let sort_col = match params.sort_column {
            SortColumn::Domain => "domain",
            SortColumn::PriceUsd => "price_usd",
            SortColumn::Length => "length",
        };
        let dir = params.sort_direction.sql_keyword();

        let count_sql = format!("SELECT COUNT(*) FROM snapshot_data WHERE {where_clause}");
        let total_count: i64 = conn.query_row(
            &count_sql,
            duckdb::params_from_iter(args.iter().map(|b| b.as_ref())),
            |row| row.get(0),
        )?;

        let data_sql = format!(
            "SELECT domain_id, domain, CAST(price_usd AS VARCHAR), length
             FROM snapshot_data
             WHERE {where_clause}
             ORDER BY {sort_col} {dir}
             LIMIT ? OFFSET ?"
        );
        args.push(Box::new(params.limit));
        args.push(Box::new(params.offset));

        let mut stmt = conn.prepare(&data_sql)?;
        let mut rows_iter = stmt.query(duckdb::params_from_iter(args.iter().map(|b| b.as_ref())))?;

        let mut rows = Vec::new();
        while let Some(row) = rows_iter.next()? {
            let price_value: Value = row.get(2)?;
            rows.push(ListingRow {
                snapshot_id: params.snapshot_id,
                domain_id: row.get(0)?,
                domain: row.get(1)?,
                price_usd: decimal_from_value(price_value)?,
                length: row.get(3)?,
            });
        }

        Ok(QueryResult { rows, total_count, elapsed_ms: started.elapsed().as_secs_f64() * 1000.0 })
    }

    /// Diff two snapshots via `FULL OUTER JOIN` on `domain_id`.
    /// Classification, `diff_type` filtering, and pagination all run in SQL -
    /// only the requested page is ever materialized in the Rust process.
    pub async fn query_diff(
        &self,
        snapshot_a: i64,
        snapshot_b: i64,
        diff_type: DiffType,
        limit: i64,
        offset: i64,
    ) -> Result<QueryResult<DiffRow>, QueryError> {
        let started = Instant::now();
        let conn = self.conn().lock_owned().await;

        let filter_condition = match diff_type {
            DiffType::New => "AND a.domain_id IS NULL AND b.domain_id IS NOT NULL",
            DiffType::Deleted => "AND a.domain_id IS NOT NULL AND b.domain_id IS NULL",
            DiffType::Changed => {
                "AND a.domain_id IS NOT NULL AND b.domain_id IS NOT NULL \
                 AND a.price_usd IS DISTINCT FROM b.price_usd"
            }
            DiffType::All => {
                "AND (a.domain_id IS NULL OR b.domain_id IS NULL \
                 OR a.price_usd IS DISTINCT FROM b.price_usd)"
            }
        };

        let base_sql = format!(
            "FROM (SELECT domain_id, domain, price_usd FROM snapshot_data WHERE snapshot_id = ?) a
             FULL OUTER JOIN (SELECT domain_id, domain, price_usd FROM snapshot_data WHERE snapshot_id = ?) b
               ON a.domain_id = b.domain_id
             WHERE 1=1 {filter_condition}"
        );

        let total_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) {base_sql}"),
            duckdb::params![snapshot_a, snapshot_b],
            |row| row.get(0),
        )?;

        let data_sql = format!(
            "SELECT
                COALESCE(a.domain_id, b.domain_id),
                COALESCE(a.domain, b.domain),
                CAST(a.price_usd AS VARCHAR),
                CAST(b.price_usd AS VARCHAR),
                CASE
                    WHEN a.domain_id IS NULL THEN 'NEW'
                    WHEN b.domain_id IS NULL THEN 'DELETED'
                    WHEN a.price_usd IS DISTINCT FROM b.price_usd THEN 'CHANGED'
                    ELSE 'UNCHANGED'
                END
             {base_sql}
             ORDER BY COALESCE(a.domain, b.domain) ASC
             LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&data_sql)?;
        let mut rows_iter =
            stmt.query(duckdb::params![snapshot_a, snapshot_b, limit, offset])?;

        let mut rows = Vec::new();
        while let Some(row) = rows_iter.next()? {
            let domain_id: i64 = row.get(0)?;
            let domain: String = row.get(1)?;
            let old_price = decimal_from_value(row.get(2)?)?;
            let new_price = decimal_from_value(row.get(3)?)?;
            let status_text: String = row.get(4)?;
            let status = match status_text.as_str() {
                "NEW" => DiffStatus::New,
                "DELETED" => DiffStatus::Deleted,
                "CHANGED" => DiffStatus::Changed,
                _ => DiffStatus::Unchanged,
            };
            rows.push(DiffRow { domain_id, domain, old_price, new_price, status });
        }

        Ok(QueryResult { rows, total_count, elapsed_ms: started.elapsed().as_secs_f64() * 1000.0 })
    }

    /// Per-listing history across every snapshot.
    pub async fn domain_history(&self, domain_id: i64) -> Result<QueryResult<HistoryEntry>, QueryError> {
        let started = Instant::now();
        let conn = self.conn().lock_owned().await;

        let sql = "
            SELECT s.id, s.name, s.created_at, CAST(sd.price_usd AS VARCHAR)
            FROM snapshots s
            LEFT JOIN snapshot_data sd ON sd.snapshot_id = s.id AND sd.domain_id = ?
            ORDER BY s.id ASC
        ";
        let mut stmt = conn.prepare(sql)?;
        let mut rows_iter = stmt.query(duckdb::params![domain_id])?;

        let mut entries = Vec::new();
        let mut previous_price: Option<Option<Decimal>> = None;
        while let Some(row) = rows_iter.next()? {
            let snapshot_id: i64 = row.get(0)?;
            let snapshot_name: String = row.get(1)?;
            let created_at = row.get(2)?;
            let price_value: Value = row.get(3)?;
            let present = !matches!(price_value, Value::Null);
            let price = decimal_from_value(price_value)?;

            let status = match previous_price {
                None => {
                    if present {
                        HistoryStatus::New
                    } else {
                        HistoryStatus::Absent
                    }
                }
                Some(prev) => match (prev, present) {
                    (None, true) => HistoryStatus::New,
                    (Some(_), false) => HistoryStatus::Deleted,
                    (None, false) => HistoryStatus::Absent,
                    (Some(prev_price), true) if Some(prev_price) != price => HistoryStatus::Changed,
                    (Some(_), true) => HistoryStatus::Unchanged,
                },
            };
            previous_price = Some(price);

            entries.push(HistoryEntry { snapshot_id, snapshot_name, created_at, price_usd: price, status });
        }

        let total_count = entries.len() as i64;
        Ok(QueryResult { rows: entries, total_count, elapsed_ms: started.elapsed().as_secs_f64() * 1000.0 })
    }
}
