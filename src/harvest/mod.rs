//! The parallel harvest engine: Coordinator → N Streams →
//! Fetcher → Parser → dedup → Staging Writer.

pub mod coordinator;
pub mod seen_set;
pub mod staging;
pub mod state;
pub mod stream;

pub use coordinator::{HarvestCoordinator, HarvestOutcome};
pub use state::{HarvestState, HarvestStatus};
