//! Harvest Coordinator: enumerates every `(length, ordering)` channel,
//! admits lengths up to the configured concurrency cap, and drives each
//! through four racing streams into a shared seen-set and staging file.
//! Grounded on `original_source/backend/scraper_service.py::run_scraper_engine`
//! / `process_length`, fanned out with the same `JoinSet`-shaped task
//! spawning conventionally used for ingest fan-out (see
//! `scrapers/binance_hardened_ingest.rs`).

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{Config, MAX_LENGTH, MIN_LENGTH};
use crate::error::HarvestError;
use crate::fetch::{Fetcher, PageFetcher};
use crate::harvest::seen_set::SeenSet;
use crate::harvest::staging::StagingWriter;
use crate::harvest::state::{HarvestState, HarvestStatus, HarvestStatusSnapshot};
use crate::harvest::stream::run_stream;
use crate::model::Ordering;
use crate::store::Store;

/// Result of one full harvest run, returned to the caller of
/// `run_once` and logged at the end of a spawned `start_harvest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOutcome {
    pub snapshot_id: Option<i64>,
    pub row_count: i64,
    pub total_extracted: u64,
    pub stopped_early: bool,
}

#[derive(Clone)]
pub struct HarvestCoordinator {
    store: Store,
    config: Config,
    staging_dir: PathBuf,
    fetcher: Arc<dyn PageFetcher>,
    state: Arc<HarvestState>,
}

impl HarvestCoordinator {
    pub fn new(store: Store, config: Config, staging_dir: PathBuf) -> Self {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(Fetcher::new(config.clone()));
        Self { store, config, staging_dir, fetcher, state: Arc::new(HarvestState::new()) }
    }

    /// Builds a coordinator around a caller-supplied fetcher - the seam
    /// integration tests and offline replay tooling use instead of the real
    /// impersonated/proxied client.
    pub fn with_fetcher(
        store: Store,
        config: Config,
        staging_dir: PathBuf,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self { store, config, staging_dir, fetcher, state: Arc::new(HarvestState::new()) }
    }

    pub fn status(&self) -> HarvestStatusSnapshot {
        self.state.snapshot()
    }

    /// Cooperative cancellation: flips the shared flag every stream checks
    /// before its next request.
    pub fn stop(&self) {
        self.state.stop();
    }

    /// Spawns the harvest in the background and returns immediately, the
    /// shape `control::DomainWatch::start_harvest` needs for a non-blocking
    /// CLI/API call.
    pub fn start(&self, snapshot_name: String) -> Result<(), HarvestError> {
        if self.state.is_running() {
            return Err(HarvestError::AlreadyRunning);
        }
        if self.config.proxy_url.is_none() {
            return Err(HarvestError::MissingProxyConfig);
        }
        let coordinator = self.clone();
        tokio::spawn(async move {
            match coordinator.run_once(snapshot_name).await {
                Ok(outcome) => info!(?outcome, "harvest finished"),
                Err(e) => warn!(error = %e, "harvest failed"),
            }
        });
        Ok(())
    }

    /// Runs one harvest to completion, awaiting every stream. Used directly
    /// by `start` (spawned) and by tests (awaited inline).
    pub async fn run_once(&self, snapshot_name: String) -> Result<HarvestOutcome, HarvestError> {
        self.state.begin(&snapshot_name);
        std::fs::create_dir_all(&self.staging_dir).ok();

        let snapshot_id = self.store.create_snapshot(&snapshot_name).await?;
        self.state.set_snapshot_id(snapshot_id);

        let staging = Arc::new(StagingWriter::create(&self.staging_dir, snapshot_id).await?);
        let seen = Arc::new(SeenSet::new());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_lengths.max(1)));

        let mut length_tasks = JoinSet::new();
        for length in MIN_LENGTH..=MAX_LENGTH {
            if !self.state.is_running() {
                break;
            }
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let seen = seen.clone();
            let staging = staging.clone();
            let state = self.state.clone();
            let config = self.config.clone();

            length_tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let mut ordering_tasks = JoinSet::new();
                for ordering in Ordering::ALL {
                    let fetcher = fetcher.clone();
                    let seen = seen.clone();
                    let staging = staging.clone();
                    let state = state.clone();
                    let config = config.clone();
                    ordering_tasks.spawn(run_stream(
                        length, ordering, fetcher, seen, staging, state, config,
                    ));
                }
                let mut new_rows = 0u64;
                while let Some(joined) = ordering_tasks.join_next().await {
                    if let Ok(outcome) = joined {
                        new_rows += outcome.new_rows;
                    }
                }
                new_rows
            });
        }

        let mut total_extracted = 0u64;
        while let Some(joined) = length_tasks.join_next().await {
            if let Ok(new_rows) = joined {
                total_extracted += new_rows;
            }
        }

        let stopped_early = !self.state.is_running();
        self.state.set_status(HarvestStatus::FinalizingDb);

        let row_count = self.store.finalize_ingest(snapshot_id, staging.path()).await?;
        if let Ok(writer) = Arc::try_unwrap(staging) {
            writer.delete().await.ok();
        }

        self.state.set_status(if stopped_early { HarvestStatus::Stopped } else { HarvestStatus::Completed });
        self.state.stop();

        Ok(HarvestOutcome {
            snapshot_id: if row_count == 0 { None } else { Some(snapshot_id) },
            row_count,
            total_extracted,
            stopped_early,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::FetchParams;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

    /// A fetcher that returns one empty page for every length/ordering, so a
    /// harvest using it terminates immediately with zero rows.
    struct EmptyFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for EmptyFetcher {
        async fn fetch(&self, _params: &FetchParams, _is_running: &AtomicBool) -> Result<String, FetchError> {
            self.calls.fetch_add(1, AtomicOrdering::Relaxed);
            Ok("<html><body></body></html>".to_string())
        }
    }

    /// A fetcher that, for one specific length, returns a handful of rows
    /// then an empty page; every other length gets an immediately-empty page.
    struct SingleLengthFetcher {
        target_length: i32,
        served: std::sync::Mutex<HashMap<(i32, &'static str), usize>>,
    }

    #[async_trait]
    impl PageFetcher for SingleLengthFetcher {
        async fn fetch(&self, params: &FetchParams, _is_running: &AtomicBool) -> Result<String, FetchError> {
            if params.length != self.target_length {
                return Ok("<html><body></body></html>".to_string());
            }
            let mut served = self.served.lock().unwrap();
            let count = served.entry((params.length, params.sort)).or_insert(0);
            *count += 1;
            if *count == 1 {
                let rows: String = (0..5)
                    .map(|i| {
                        format!(
                            r#"<div class="domain-row"><span class="domain"><a class="link">d{i}-{}.com</a><span class="price">$10.00</span></span></div>"#,
                            params.sort
                        )
                    })
                    .collect();
                Ok(format!("<html><body>{rows}</body></html>"))
            } else {
                Ok("<html><body></body></html>".to_string())
            }
        }
    }

    #[tokio::test]
    async fn empty_harvest_produces_no_snapshot() {
        let store = Store::open_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.proxy_url = Some("http://proxy.example:8080".into());
        let fetcher: Arc<dyn PageFetcher> = Arc::new(EmptyFetcher { calls: AtomicUsize::new(0) });
        let coordinator =
            HarvestCoordinator::with_fetcher(store, config, dir.path().to_path_buf(), fetcher);

        let outcome = coordinator.run_once("empty".to_string()).await.unwrap();
        assert_eq!(outcome.row_count, 0);
        assert!(outcome.snapshot_id.is_none());
    }

    #[tokio::test]
    async fn single_length_harvest_ingests_its_rows() {
        let store = Store::open_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.proxy_url = Some("http://proxy.example:8080".into());
        config.max_concurrent_lengths = 63;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(SingleLengthFetcher {
            target_length: 7,
            served: std::sync::Mutex::new(HashMap::new()),
        });
        let coordinator =
            HarvestCoordinator::with_fetcher(store, config, dir.path().to_path_buf(), fetcher);

        let outcome = coordinator.run_once("single-length".to_string()).await.unwrap();
        assert_eq!(outcome.row_count, 5);
        assert!(outcome.snapshot_id.is_some());
    }

    #[tokio::test]
    async fn start_rejects_concurrent_harvests() {
        let store = Store::open_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.proxy_url = Some("http://proxy.example:8080".into());
        let fetcher: Arc<dyn PageFetcher> = Arc::new(EmptyFetcher { calls: AtomicUsize::new(0) });
        let coordinator =
            HarvestCoordinator::with_fetcher(store, config, dir.path().to_path_buf(), fetcher);

        coordinator.state.begin("already-running");
        assert!(matches!(coordinator.start("another".to_string()), Err(HarvestError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn start_rejects_missing_proxy_config() {
        let store = Store::open_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let fetcher: Arc<dyn PageFetcher> = Arc::new(EmptyFetcher { calls: AtomicUsize::new(0) });
        let coordinator =
            HarvestCoordinator::with_fetcher(store, config, dir.path().to_path_buf(), fetcher);

        assert!(matches!(coordinator.start("x".to_string()), Err(HarvestError::MissingProxyConfig)));
    }
}
