//! Stream: drives one `(length, ordering)` channel. Sequential
//! requests, dedup against the shared SeenSet, meet-in-the-middle
//! termination. Grounded on
//! `original_source/backend/scraper_service.py::fetch_stream`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{Config, RECORDS_PER_PAGE};
use crate::fetch::{FetchParams, PageFetcher};
use crate::harvest::seen_set::SeenSet;
use crate::harvest::staging::StagingWriter;
use crate::harvest::state::HarvestState;
use crate::model::Ordering;
use crate::parse::parse_page;

/// Why a stream stopped; used only for logging/tests, never surfaced as an
/// error - stream termination (normal or abnormal) never escapes to
/// siblings or the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    TokenExpired,
    EmptyPage,
    Overlap,
    NoNextToken,
    RetriesExhausted,
    Cancelled,
    StagingFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub length: i32,
    pub ordering: Ordering,
    pub new_rows: u64,
    pub end: StreamEnd,
}

/// Runs one stream to completion, appending newly-seen listings to
/// `staging` as pages arrive. Never returns an `Err` - every termination
/// mode is represented in `StreamOutcome::end`.
pub async fn run_stream(
    length: i32,
    ordering: Ordering,
    fetcher: Arc<dyn PageFetcher>,
    seen: Arc<SeenSet>,
    staging: Arc<StagingWriter>,
    state: Arc<HarvestState>,
    config: Config,
) -> StreamOutcome {
    let mut start_index: u32 = 1;
    let mut next_token: Option<String> = None;
    let mut new_rows: u64 = 0;
    let overlap_trigger = config.overlap_trigger_count();

    loop {
        if !state.is_running() {
            return StreamOutcome { length, ordering, new_rows, end: StreamEnd::Cancelled };
        }

        let params = FetchParams {
            start: start_index,
            length,
            sort: ordering.as_query_value(),
            next_token: next_token.clone(),
        };

        let body = match fetcher.fetch(&params, &state.is_running).await {
            Ok(body) => body,
            Err(e) if !e.is_retryable() => {
                debug!(length, %ordering, "stream terminated: token expired/end (302)");
                return StreamOutcome { length, ordering, new_rows, end: StreamEnd::TokenExpired };
            }
            Err(_) => {
                return StreamOutcome {
                    length,
                    ordering,
                    new_rows,
                    end: StreamEnd::RetriesExhausted,
                };
            }
        };

        if !state.is_running() {
            return StreamOutcome { length, ordering, new_rows, end: StreamEnd::Cancelled };
        }

        let (rows, parsed_next_token) = parse_page(&body);
        next_token = parsed_next_token;

        if rows.is_empty() {
            debug!(length, %ordering, "stream terminated: empty page");
            return StreamOutcome { length, ordering, new_rows, end: StreamEnd::EmptyPage };
        }

        let mut overlap_count = 0usize;
        let mut fresh = Vec::with_capacity(rows.len());
        for listing in rows {
            if seen.insert_if_new(&listing.name) {
                fresh.push(listing);
            } else {
                overlap_count += 1;
            }
        }

        if !fresh.is_empty() {
            match staging.append(&fresh).await {
                Ok(()) => {
                    new_rows += fresh.len() as u64;
                    state.record_extracted(fresh.len() as u64);
                }
                Err(e) => {
                    warn!(length, %ordering, error = %e, "stream terminated: staging write failed");
                    return StreamOutcome { length, ordering, new_rows, end: StreamEnd::StagingFailed };
                }
            }
        }

        debug!(
            length,
            %ordering,
            start = start_index,
            new = fresh.len(),
            overlap = overlap_count,
            "page processed"
        );

        if overlap_count > overlap_trigger {
            debug!(length, %ordering, overlap_count, "stream terminated: meet-in-the-middle");
            return StreamOutcome { length, ordering, new_rows, end: StreamEnd::Overlap };
        }

        // Mirrors the upstream's own "first page is 1, subsequent pages are
        // RECORDS_PER_PAGE-aligned" pagination convention.
        start_index = if start_index == 1 {
            RECORDS_PER_PAGE as u32
        } else {
            start_index + RECORDS_PER_PAGE as u32
        };

        if next_token.is_none() {
            return StreamOutcome { length, ordering, new_rows, end: StreamEnd::NoNextToken };
        }
    }
}
