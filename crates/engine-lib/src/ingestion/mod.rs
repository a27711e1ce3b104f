//! Observation ingestion
//!
//! Sources hand observations to the continuous runner one at a time:
//! - CSV replay of the milling dataset with pacing and optional looping
//! - JSON lines from any async reader (stdin in the service)
//! - In-memory observations for tests and embedding

mod csv;
mod json;
mod memory;

pub use self::csv::{CsvReplaySource, ReplayConfig, DEFAULT_REPLAY_PACE};
pub use self::json::JsonLinesSource;
pub use self::memory::MemorySource;

use crate::models::Observation;
use anyhow::Result;
use async_trait::async_trait;

/// Lazy, possibly infinite sequence of observations
#[async_trait]
pub trait ObservationSource: Send {
    /// Next observation, or `None` once the source is exhausted
    async fn next_observation(&mut self) -> Result<Option<Observation>>;

    /// Short label for logs and health details
    fn name(&self) -> &str;
}
