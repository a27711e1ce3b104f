//! Decision history retained for downstream consumers

mod buffer;
mod summary;

pub use buffer::{HistoryBuffer, SharedHistory, DEFAULT_HISTORY_CAPACITY};
pub use summary::{ActionSummary, HistorySummary};
