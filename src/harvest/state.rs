//! Process-wide harvest state: atomics for the fields mutated on
//! every page (`is_running`, `total_extracted`), a mutex for the fields
//! only written at lifecycle transitions (`status`, `snapshot_name`).
//! Mirrors the atomics-plus-mutex state split `AppState`/
//! `DataSourceKillSwitch` use elsewhere in this codebase's `main.rs`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStatus {
    Idle,
    Scraping,
    FinalizingDb,
    Completed,
    Stopped,
}

impl HarvestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HarvestStatus::Idle => "idle",
            HarvestStatus::Scraping => "scraping",
            HarvestStatus::FinalizingDb => "finalizing_db",
            HarvestStatus::Completed => "completed",
            HarvestStatus::Stopped => "stopped",
        }
    }
}

pub struct HarvestState {
    pub is_running: AtomicBool,
    pub total_extracted: AtomicU64,
    status: Mutex<HarvestStatus>,
    snapshot_name: Mutex<String>,
    snapshot_id: Mutex<Option<i64>>,
}

/// A point-in-time read of `HarvestState`, returned to the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestStatusSnapshot {
    pub is_running: bool,
    pub status: &'static str,
    pub snapshot_name: String,
    pub total_extracted: u64,
}

impl Default for HarvestState {
    fn default() -> Self {
        Self {
            is_running: AtomicBool::new(false),
            total_extracted: AtomicU64::new(0),
            status: Mutex::new(HarvestStatus::Idle),
            snapshot_name: Mutex::new(String::new()),
            snapshot_id: Mutex::new(None),
        }
    }
}

impl HarvestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, snapshot_name: &str) {
        self.is_running.store(true, AtomicOrdering::SeqCst);
        self.total_extracted.store(0, AtomicOrdering::SeqCst);
        *self.status.lock() = HarvestStatus::Scraping;
        *self.snapshot_name.lock() = snapshot_name.to_string();
        *self.snapshot_id.lock() = None;
    }

    pub fn set_snapshot_id(&self, id: i64) {
        *self.snapshot_id.lock() = Some(id);
    }

    pub fn snapshot_id(&self) -> Option<i64> {
        *self.snapshot_id.lock()
    }

    pub fn set_status(&self, status: HarvestStatus) {
        *self.status.lock() = status;
    }

    pub fn record_extracted(&self, count: u64) -> u64 {
        self.total_extracted.fetch_add(count, AtomicOrdering::Relaxed) + count
    }

    /// Cooperative cancellation: checked before every request and between
    /// parser output and staging.
    pub fn stop(&self) {
        self.is_running.store(false, AtomicOrdering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(AtomicOrdering::SeqCst)
    }

    pub fn snapshot(&self) -> HarvestStatusSnapshot {
        HarvestStatusSnapshot {
            is_running: self.is_running(),
            status: self.status.lock().as_str(),
            snapshot_name: self.snapshot_name.lock().clone(),
            total_extracted: self.total_extracted.load(AtomicOrdering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_resets_counters_and_flips_running() {
        let state = HarvestState::new();
        state.record_extracted(5);
        state.begin("my-snapshot");
        let snap = state.snapshot();
        assert!(snap.is_running);
        assert_eq!(snap.status, "scraping");
        assert_eq!(snap.snapshot_name, "my-snapshot");
        assert_eq!(snap.total_extracted, 0);
    }

    #[test]
    fn stop_flips_running_without_touching_counters() {
        let state = HarvestState::new();
        state.begin("x");
        state.record_extracted(100);
        state.stop();
        let snap = state.snapshot();
        assert!(!snap.is_running);
        assert_eq!(snap.total_extracted, 100);
    }
}
