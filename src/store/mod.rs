//! Snapshot store: an embedded DuckDB database holding `domains`,
//! `snapshots`, and `snapshot_data`. Two-pass transactional ingest from a
//! staging CSV, matching `original_source/backend/database.py::init_db` and
//! `finalize_scrape`. The connection is held behind a tokio mutex, locked
//! for the duration of each call.

pub mod query;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{IngestError, QueryError};
use crate::model::Snapshot;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (creating if absent) the database at `path` and ensures the
    /// schema exists. Safe to call repeatedly - every DDL statement is
    /// `IF NOT EXISTS`.
    pub async fn open(path: &Path) -> Result<Self, duckdb::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        info!(path = %path.display(), "snapshot store opened");
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, duckdb::Error> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Creates an empty snapshot row, returning its id. Row count is filled
    /// in by `finalize_ingest`.
    pub async fn create_snapshot(&self, name: &str) -> Result<i64, duckdb::Error> {
        let conn = self.conn.lock().await;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO snapshots (name, created_at, row_count) VALUES (?, ?, 0)",
            duckdb::params![name, now],
        )?;
        conn.query_row("SELECT currval('seq_snapshots_id')", [], |row| row.get(0))
    }

    /// Pass 1 + pass 2 of the ingest described above, inside one
    /// transaction: upsert every staged name into `domains`, then insert the
    /// `(snapshot, domain, price)` facts by joining back on name. Rolls back
    /// and deletes the empty snapshot row if the staged file produced zero
    /// rows.
    pub async fn finalize_ingest(
        &self,
        snapshot_id: i64,
        staging_path: &Path,
    ) -> Result<i64, IngestError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let csv_path = staging_path.to_string_lossy().to_string();

        // `price_numeric` is forced to VARCHAR on read: left to auto-detection,
        // DuckDB sniffs it as a numeric column for any real harvest (every
        // sampled value parses as a number), and comparing that numeric
        // column against the empty-string literal below would then force an
        // implicit `CAST('' AS DECIMAL(12,2))` that fails to parse - a type
        // error at bind time, not a per-row one.
        let read_csv = format!(
            "read_csv_auto('{csv_path}', types={{'price_numeric': 'VARCHAR'}})"
        );

        tx.execute(
            &format!(
                "INSERT INTO domains (name, length)
                 SELECT DISTINCT domain_name, length_numeric
                 FROM {read_csv}
                 WHERE domain_name IS NOT NULL
                 ON CONFLICT (name) DO NOTHING"
            ),
            [],
        )?;

        tx.execute(
            &format!(
                "INSERT INTO snapshot_data (snapshot_id, domain_id, domain, price_usd, length)
                 SELECT ?, d.id, c.domain_name,
                        CAST(NULLIF(c.price_numeric, '') AS DECIMAL(12,2)),
                        c.length_numeric
                 FROM {read_csv} c
                 JOIN domains d ON d.name = c.domain_name"
            ),
            duckdb::params![snapshot_id],
        )?;

        let row_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM snapshot_data WHERE snapshot_id = ?",
            duckdb::params![snapshot_id],
            |row| row.get(0),
        )?;

        if row_count == 0 {
            tx.execute(
                "DELETE FROM snapshots WHERE id = ?",
                duckdb::params![snapshot_id],
            )?;
            tx.commit()?;
            return Ok(0);
        }

        tx.execute(
            "UPDATE snapshots SET row_count = ? WHERE id = ?",
            duckdb::params![row_count, snapshot_id],
        )?;
        tx.commit()?;
        Ok(row_count)
    }

    pub async fn delete_snapshot(&self, snapshot_id: i64) -> Result<bool, duckdb::Error> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM snapshot_data WHERE snapshot_id = ?",
            duckdb::params![snapshot_id],
        )?;
        let affected = conn.execute(
            "DELETE FROM snapshots WHERE id = ?",
            duckdb::params![snapshot_id],
        )?;
        Ok(affected > 0)
    }

    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>, duckdb::Error> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, row_count FROM snapshots ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Snapshot {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
                row_count: row.get(3)?,
            })
        })?;
        rows.collect()
    }

    pub async fn snapshot_by_id(&self, snapshot_id: i64) -> Result<Snapshot, QueryError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, name, created_at, row_count FROM snapshots WHERE id = ?",
            duckdb::params![snapshot_id],
            |row| {
                Ok(Snapshot {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                    row_count: row.get(3)?,
                })
            },
        )
        .map_err(|_| QueryError::SnapshotNotFound(snapshot_id))
    }

    pub(crate) fn conn(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

fn init_schema(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(
        "
        CREATE SEQUENCE IF NOT EXISTS seq_domains_id START 1;
        CREATE SEQUENCE IF NOT EXISTS seq_snapshots_id START 1;

        CREATE TABLE IF NOT EXISTS domains (
            id     BIGINT PRIMARY KEY DEFAULT nextval('seq_domains_id'),
            name   VARCHAR NOT NULL UNIQUE,
            length INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshots (
            id         BIGINT PRIMARY KEY DEFAULT nextval('seq_snapshots_id'),
            name       VARCHAR NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL,
            row_count  BIGINT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshot_data (
            snapshot_id BIGINT NOT NULL,
            domain_id   BIGINT NOT NULL,
            domain      VARCHAR NOT NULL,
            price_usd   DECIMAL(12,2),
            length      INTEGER NOT NULL,
            PRIMARY KEY (snapshot_id, domain_id)
        );
        CREATE INDEX IF NOT EXISTS idx_domain ON snapshot_data(domain);
        CREATE INDEX IF NOT EXISTS idx_snapshot ON snapshot_data(snapshot_id);
        CREATE INDEX IF NOT EXISTS idx_snap_domain ON snapshot_data(snapshot_id, domain);
        CREATE INDEX IF NOT EXISTS idx_sd_domain_id ON snapshot_data(domain_id);
        ",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn write_csv(dir: &Path, rows: &[(&str, &str, i32)]) -> std::path::PathBuf {
        let path = dir.join("staging.csv");
        let mut file = tokio::fs::File::create(&path).await.unwrap();
        file.write_all(b"domain_name,price_numeric,length_numeric\n").await.unwrap();
        for (name, price, length) in rows {
            file.write_all(format!("{name},{price},{length}\n").as_bytes()).await.unwrap();
        }
        path
    }

    #[tokio::test]
    async fn finalize_ingest_populates_domains_and_snapshot_data() {
        let store = Store::open_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            &[("foo.com", "100.00", 3), ("bar.net", "", 3)],
        )
        .await;

        let snapshot_id = store.create_snapshot("snap-1").await.unwrap();
        let row_count = store.finalize_ingest(snapshot_id, &csv).await.unwrap();
        assert_eq!(row_count, 2);

        let snapshot = store.snapshot_by_id(snapshot_id).await.unwrap();
        assert_eq!(snapshot.row_count, 2);
    }

    #[tokio::test]
    async fn finalize_ingest_rolls_back_empty_snapshot() {
        let store = Store::open_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(dir.path(), &[]).await;

        let snapshot_id = store.create_snapshot("empty").await.unwrap();
        let row_count = store.finalize_ingest(snapshot_id, &csv).await.unwrap();
        assert_eq!(row_count, 0);
        assert!(store.snapshot_by_id(snapshot_id).await.is_err());
    }

    #[tokio::test]
    async fn delete_snapshot_removes_row_and_facts() {
        let store = Store::open_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(dir.path(), &[("foo.com", "1.00", 3)]).await;
        let snapshot_id = store.create_snapshot("s").await.unwrap();
        store.finalize_ingest(snapshot_id, &csv).await.unwrap();

        assert!(store.delete_snapshot(snapshot_id).await.unwrap());
        assert!(store.snapshot_by_id(snapshot_id).await.is_err());
    }

    #[tokio::test]
    async fn repeated_names_across_snapshots_reuse_the_same_domain_id() {
        let store = Store::open_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let csv1 = write_csv(dir.path(), &[("foo.com", "1.00", 3)]).await;
        let s1 = store.create_snapshot("s1").await.unwrap();
        store.finalize_ingest(s1, &csv1).await.unwrap();

        let csv2 = write_csv(dir.path(), &[("foo.com", "2.00", 3)]).await;
        let s2 = store.create_snapshot("s2").await.unwrap();
        store.finalize_ingest(s2, &csv2).await.unwrap();

        let snapshots = store.list_snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 2);
    }
}
