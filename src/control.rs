//! Control surface: the thin async pass-through methods a binding
//! layer (HTTP, CLI, anything) would call. Grounded on the endpoint bodies
//! in `original_source/backend/main.py`, minus the FastAPI routing those
//! bodies lived inside.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::{HarvestError, QueryError};
use crate::harvest::HarvestCoordinator;
use crate::model::{DiffRow, DiffType, HistoryEntry, ListingRow, QueryResult, Snapshot};
use crate::store::query::BrowseParams;
use crate::store::Store;

/// The whole system wired together: one store, one coordinator. Cloning is
/// cheap (both inner types are `Arc`-backed) so this can be shared across
/// however many binding-layer handlers a caller adds.
#[derive(Clone)]
pub struct DomainWatch {
    store: Store,
    coordinator: HarvestCoordinator,
}

impl DomainWatch {
    pub async fn open(config: Config) -> Result<Self, duckdb::Error> {
        let store = Store::open(&config.db_path).await?;
        let staging_dir = config
            .db_path
            .parent()
            .map(|p| p.join("staging"))
            .unwrap_or_else(|| PathBuf::from("staging"));
        let coordinator = HarvestCoordinator::new(store.clone(), config, staging_dir);
        Ok(Self { store, coordinator })
    }

    pub fn start_harvest(&self, snapshot_name: String) -> Result<(), HarvestError> {
        self.coordinator.start(snapshot_name)
    }

    pub fn harvest_status(&self) -> HarvestStatusView {
        let snap = self.coordinator.status();
        HarvestStatusView {
            is_running: snap.is_running,
            status: snap.status,
            snapshot_name: snap.snapshot_name,
            total_extracted: snap.total_extracted,
        }
    }

    pub fn stop_harvest(&self) {
        self.coordinator.stop();
    }

    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>, duckdb::Error> {
        self.store.list_snapshots().await
    }

    pub async fn delete_snapshot(&self, snapshot_id: i64) -> Result<bool, duckdb::Error> {
        self.store.delete_snapshot(snapshot_id).await
    }

    pub async fn query_rows(
        &self,
        params: BrowseParams<'_>,
    ) -> Result<QueryResult<ListingRow>, QueryError> {
        self.store.query_rows(params).await
    }

    pub async fn query_diff(
        &self,
        snapshot_a: i64,
        snapshot_b: i64,
        diff_type: DiffType,
        limit: i64,
        offset: i64,
    ) -> Result<QueryResult<DiffRow>, QueryError> {
        self.store.query_diff(snapshot_a, snapshot_b, diff_type, limit, offset).await
    }

    pub async fn domain_history(&self, domain_id: i64) -> Result<QueryResult<HistoryEntry>, QueryError> {
        self.store.domain_history(domain_id).await
    }
}

/// Flattened, binding-agnostic status view; avoids leaking the internal
/// `HarvestStatusSnapshot` type's `&'static str` status field shape.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HarvestStatusView {
    pub is_running: bool,
    pub status: &'static str,
    pub snapshot_name: String,
    pub total_extracted: u64,
}
