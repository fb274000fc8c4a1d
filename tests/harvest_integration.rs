//! End-to-end harvest/query scenarios, driven through the public library
//! API with a scripted fetcher standing in for the real impersonated HTTP
//! client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use domainwatch::config::Config;
use domainwatch::error::FetchError;
use domainwatch::fetch::{FetchParams, PageFetcher};
use domainwatch::harvest::HarvestCoordinator;
use domainwatch::model::DiffType;
use domainwatch::store::query::BrowseParams;
use domainwatch::store::Store;

fn domain_row(name: &str, price: &str) -> String {
    format!(
        r#"<div class="domain-row"><span class="domain"><a class="link">{name}</a><span class="price">{price}</span></span></div>"#
    )
}

fn page(rows: &[(&str, &str)]) -> String {
    let body: String = rows.iter().map(|(n, p)| domain_row(n, p)).collect();
    format!("<html><body>{body}</body></html>")
}

/// Serves one fixed page per `(length, sort)` key, then an empty page on
/// every subsequent call for that key - good enough to drive a coordinator
/// through a whole harvest without a real network.
struct FixtureFetcher {
    pages: HashMap<(i32, &'static str), Vec<(String, String)>>,
    calls: Mutex<HashMap<(i32, &'static str), usize>>,
}

impl FixtureFetcher {
    fn new(pages: HashMap<(i32, &'static str), Vec<(String, String)>>) -> Self {
        Self { pages, calls: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, params: &FetchParams, _is_running: &AtomicBool) -> Result<String, FetchError> {
        let key = (params.length, params.sort);
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry(key).or_insert(0);
        *count += 1;
        if *count > 1 {
            return Ok(page(&[]));
        }
        match self.pages.get(&key) {
            Some(rows) => {
                let pairs: Vec<(&str, &str)> =
                    rows.iter().map(|(n, p)| (n.as_str(), p.as_str())).collect();
                Ok(page(&pairs))
            }
            None => Ok(page(&[])),
        }
    }
}

async fn harvest_with(
    pages: HashMap<(i32, &'static str), Vec<(String, String)>>,
) -> (Store, HarvestCoordinator, tempfile::TempDir) {
    let db_dir = tempfile::tempdir().unwrap();
    let store = Store::open(&db_dir.path().join("test.duckdb")).await.unwrap();
    let staging_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.proxy_url = Some("http://proxy.example:8080".into());
    let fetcher: Arc<dyn PageFetcher> = Arc::new(FixtureFetcher::new(pages));
    let coordinator =
        HarvestCoordinator::with_fetcher(store.clone(), config, staging_dir.path().to_path_buf(), fetcher);
    (store, coordinator, staging_dir)
}

#[tokio::test]
async fn empty_catalog_produces_no_snapshot() {
    let (_store, coordinator, _dir) = harvest_with(HashMap::new()).await;
    let outcome = coordinator.run_once("empty".to_string()).await.unwrap();
    assert_eq!(outcome.row_count, 0);
    assert!(outcome.snapshot_id.is_none());
}

#[tokio::test]
async fn single_length_harvest_ingests_every_distinct_row() {
    let mut pages = HashMap::new();
    pages.insert(
        (5, "PriceAsc"),
        vec![
            ("alpha.com".to_string(), "$10.00".to_string()),
            ("bravo.com".to_string(), "$20.00".to_string()),
        ],
    );
    let (store, coordinator, _dir) = harvest_with(pages).await;

    let outcome = coordinator.run_once("single".to_string()).await.unwrap();
    assert_eq!(outcome.row_count, 2);
    let snapshot_id = outcome.snapshot_id.unwrap();

    let rows = store
        .query_rows(BrowseParams {
            snapshot_id,
            search_mode: None,
            search_term: None,
            min_price: None,
            max_price: None,
            min_length: None,
            max_length: None,
            sort_column: domainwatch::model::SortColumn::Domain,
            sort_direction: domainwatch::model::SortDirection::Asc,
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();
    assert_eq!(rows.total_count, 2);
}

#[tokio::test]
async fn meet_in_the_middle_dedups_across_orderings_of_the_same_length() {
    // Every ordering for length 4 reports the exact same two rows; since
    // they all race into the same seen-set, the snapshot ends up with 2
    // rows, not 8.
    let shared = vec![
        ("shared1.com".to_string(), "$5.00".to_string()),
        ("shared2.com".to_string(), "$6.00".to_string()),
    ];
    let mut pages = HashMap::new();
    for sort in ["PriceAsc", "PriceDesc", "NameAsc", "NameDesc"] {
        pages.insert((4, sort), shared.clone());
    }
    let (_store, coordinator, _dir) = harvest_with(pages).await;
    let outcome = coordinator.run_once("mitm".to_string()).await.unwrap();
    assert_eq!(outcome.row_count, 2);
}

#[tokio::test]
async fn diff_of_two_harvests_reports_new_deleted_changed() {
    let mut pages_a = HashMap::new();
    pages_a.insert(
        (3, "PriceAsc"),
        vec![
            ("foo.com".to_string(), "$100.00".to_string()),
            ("bar.com".to_string(), "$200.00".to_string()),
        ],
    );
    let (store, coordinator, _dir) = harvest_with(pages_a).await;
    let outcome_a = coordinator.run_once("snap-a".to_string()).await.unwrap();
    let snap_a = outcome_a.snapshot_id.unwrap();

    let mut pages_b = HashMap::new();
    pages_b.insert(
        (3, "PriceAsc"),
        vec![
            ("foo.com".to_string(), "$150.00".to_string()),
            ("baz.com".to_string(), "$300.00".to_string()),
        ],
    );
    let staging_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.proxy_url = Some("http://proxy.example:8080".into());
    let fetcher: Arc<dyn PageFetcher> = Arc::new(FixtureFetcher::new(pages_b));
    let coordinator_b =
        HarvestCoordinator::with_fetcher(store.clone(), config, staging_dir.path().to_path_buf(), fetcher);
    let outcome_b = coordinator_b.run_once("snap-b".to_string()).await.unwrap();
    let snap_b = outcome_b.snapshot_id.unwrap();

    let diff = store.query_diff(snap_a, snap_b, DiffType::All, 100, 0).await.unwrap();
    let statuses: HashMap<_, _> = diff.rows.iter().map(|r| (r.domain.clone(), r.status)).collect();
    assert_eq!(statuses["baz.com"], domainwatch::model::DiffStatus::New);
    assert_eq!(statuses["bar.com"], domainwatch::model::DiffStatus::Deleted);
    assert_eq!(statuses["foo.com"], domainwatch::model::DiffStatus::Changed);
}

/// A fetcher that pauses on every call, giving the test time to call
/// `stop()` on the coordinator mid-harvest.
struct SlowFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for SlowFetcher {
    async fn fetch(&self, _params: &FetchParams, _is_running: &AtomicBool) -> Result<String, FetchError> {
        self.calls.fetch_add(1, AtomicOrdering::Relaxed);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(page(&[("slow.com", "$1.00")]))
    }
}

#[tokio::test]
async fn stopping_a_harvest_mid_flight_ends_it_early() {
    let db_dir = tempfile::tempdir().unwrap();
    let store = Store::open(&db_dir.path().join("test.duckdb")).await.unwrap();
    let staging_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.proxy_url = Some("http://proxy.example:8080".into());
    config.max_concurrent_lengths = 1;
    let fetcher: Arc<dyn PageFetcher> = Arc::new(SlowFetcher { calls: AtomicUsize::new(0) });
    let coordinator =
        HarvestCoordinator::with_fetcher(store, config, staging_dir.path().to_path_buf(), fetcher);

    let coordinator_clone = coordinator.clone();
    let handle = tokio::spawn(async move { coordinator_clone.run_once("stopped".to_string()).await });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    coordinator.stop();

    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.stopped_early);
}
