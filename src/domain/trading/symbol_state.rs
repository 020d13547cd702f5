use crate::domain::market::history::HistoryBuffer;
use crate::domain::trading::types::{ActiveCandle, Candle};
use rust_decimal::Decimal;

/// Everything the pipeline knows about one symbol.
///
/// Owned by exactly one writer (the aggregator inside the engine task).
#[derive(Debug, Clone)]
pub struct SymbolState {
    pub symbol: String,
    pub history: HistoryBuffer,
    pub active: Option<ActiveCandle>,
}

impl SymbolState {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            history: HistoryBuffer::new(capacity),
            active: None,
        }
    }

    /// Most recent close known for the symbol, closed history preferred.
    pub fn last_close(&self) -> Option<Decimal> {
        self.history.latest().map(|c| c.close)
    }

    pub fn latest_closed(&self) -> Option<&Candle> {
        self.history.latest()
    }

    /// Bucket of the newest closed candle, if any.
    pub fn latest_bucket(&self) -> Option<i64> {
        self.history.latest().map(|c| c.open_time)
    }
}
