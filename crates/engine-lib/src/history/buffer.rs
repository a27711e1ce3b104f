//! Rolling decision history
//!
//! Fixed-capacity ring of decision records:
//! - Insertion order preserved
//! - FIFO eviction once capacity is exceeded
//! - Shared handle with a read/write lock for concurrent callers

use super::summary::HistorySummary;
use crate::error::EngineError;
use crate::models::DecisionRecord;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default number of retained decisions
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Bounded, insertion-ordered store of recent decision records
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    records: VecDeque<DecisionRecord>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        if capacity == 0 {
            return Err(EngineError::config("history capacity must be at least 1"));
        }
        Ok(Self {
            records: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
        })
    }

    /// Append a record, returning the evicted oldest one when full
    pub fn append(&mut self, record: DecisionRecord) -> Option<DecisionRecord> {
        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    /// Most recent `min(n, len)` records, oldest first
    pub fn latest(&self, n: usize) -> Vec<DecisionRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn all(&self) -> Vec<DecisionRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Critical records ordered by priority, then sequence index
    pub fn critical(&self) -> Vec<DecisionRecord> {
        let mut critical: Vec<DecisionRecord> = self
            .records
            .iter()
            .filter(|r| r.is_critical())
            .cloned()
            .collect();
        critical.sort_by_key(|r| (r.priority, r.sequence_index));
        critical
    }

    /// Most recent record with the given sequence index
    ///
    /// Indices are caller-supplied and may repeat, so the scan runs from the
    /// newest record backwards.
    pub fn find(&self, sequence_index: u64) -> Option<DecisionRecord> {
        self.records
            .iter()
            .rev()
            .find(|r| r.sequence_index == sequence_index)
            .cloned()
    }

    pub fn summary(&self) -> HistorySummary {
        HistorySummary::from_records(self.records.iter())
    }
}

/// Cloneable handle to a history buffer behind a read/write lock
///
/// Appends take the write lock; reads take the read lock and return owned
/// copies. A poisoned lock is recovered since the buffer holds no partial
/// state across an append.
#[derive(Debug, Clone)]
pub struct SharedHistory {
    inner: Arc<RwLock<HistoryBuffer>>,
}

impl SharedHistory {
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        Ok(Self::from_buffer(HistoryBuffer::new(capacity)?))
    }

    pub fn from_buffer(buffer: HistoryBuffer) -> Self {
        Self {
            inner: Arc::new(RwLock::new(buffer)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HistoryBuffer> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HistoryBuffer> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn append(&self, record: DecisionRecord) -> Option<DecisionRecord> {
        self.write().append(record)
    }

    pub fn latest(&self, n: usize) -> Vec<DecisionRecord> {
        self.read().latest(n)
    }

    pub fn all(&self) -> Vec<DecisionRecord> {
        self.read().all()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    pub fn critical(&self) -> Vec<DecisionRecord> {
        self.read().critical()
    }

    pub fn find(&self, sequence_index: u64) -> Option<DecisionRecord> {
        self.read().find(sequence_index)
    }

    pub fn summary(&self) -> HistorySummary {
        self.read().summary()
    }
}
