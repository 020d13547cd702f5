use crate::domain::trading::types::Candle;
use std::collections::HashSet;

/// Result of offering a single closed candle to a [`HistoryBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// A candle for this bucket is already buffered.
    Duplicate,
    /// Older than the newest buffered candle. Use [`HistoryBuffer::merge`] for backfill.
    Stale,
}

/// Bounded, strictly time-ordered sequence of closed candles for one symbol.
///
/// Bucket timestamps are unique and increasing; once the buffer exceeds its
/// capacity the oldest candles are evicted first.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    candles: Vec<Candle>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            candles: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn append(&mut self, candle: Candle) -> AppendOutcome {
        if let Some(last) = self.candles.last() {
            if candle.open_time == last.open_time {
                return AppendOutcome::Duplicate;
            }
            if candle.open_time < last.open_time {
                // Could still be a duplicate of an older bucket
                return if self.contains(candle.open_time) {
                    AppendOutcome::Duplicate
                } else {
                    AppendOutcome::Stale
                };
            }
        }

        self.candles.push(candle);
        self.evict();
        AppendOutcome::Appended
    }

    /// Insert every candle whose bucket is not buffered yet, then restore ordering.
    ///
    /// Returns how many candles were inserted (before eviction).
    pub fn merge(&mut self, candles: &[Candle]) -> usize {
        let mut seen: HashSet<i64> = self.candles.iter().map(|c| c.open_time).collect();
        let mut inserted = 0;

        for candle in candles {
            if seen.insert(candle.open_time) {
                self.candles.push(*candle);
                inserted += 1;
            }
        }

        if inserted > 0 {
            self.candles.sort_by_key(|c| c.open_time);
            self.evict();
        }
        inserted
    }

    /// Ordered view for indicator computation.
    pub fn snapshot(&self) -> &[Candle] {
        &self.candles
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn contains(&self, open_time: i64) -> bool {
        self.candles
            .binary_search_by_key(&open_time, |c| c.open_time)
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict(&mut self) {
        if self.candles.len() > self.capacity {
            let excess = self.candles.len() - self.capacity;
            self.candles.drain(..excess);
        }
    }
}
