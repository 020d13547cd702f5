use crate::domain::market::history::{AppendOutcome, HistoryBuffer};
use crate::domain::market::timeframe::bucket_start;
use crate::domain::trading::symbol_state::SymbolState;
use crate::domain::trading::types::{ActiveCandle, Candle, CandleOrigin};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What a single tick did to its symbol's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// First tick of a new bucket, nothing closed.
    Opened,
    Updated,
    /// The previous bucket closed and was appended to history; a new bucket is open.
    Closed(Candle),
    /// Bucket at or before already aggregated data. State untouched.
    Late,
    Outlier,
}

impl TickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Opened => "opened",
            TickOutcome::Updated => "updated",
            TickOutcome::Closed(_) => "closed",
            TickOutcome::Late => "late",
            TickOutcome::Outlier => "outlier",
        }
    }
}

/// What a vendor native candle did to its symbol's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeOutcome {
    Closed(Candle),
    /// Closed candle whose bucket is already buffered (e.g. replayed after a reconnect).
    Duplicate,
    ShadowUpdated,
    Late,
}

/// Per-symbol state store turning ticks and native candles into closed candles.
///
/// Must be driven from a single task: it is the only writer of every
/// [`SymbolState`] it holds.
pub struct CandleAggregator {
    states: HashMap<String, SymbolState>,
    interval_seconds: i64,
    capacity: usize,
    /// Maximum allowed deviation from the last known price (as a ratio).
    /// `None` disables the filter.
    max_deviation: Option<Decimal>,
}

impl CandleAggregator {
    pub fn new(interval_seconds: i64, capacity: usize) -> Self {
        Self {
            states: HashMap::new(),
            interval_seconds: interval_seconds.max(1),
            capacity,
            max_deviation: None,
        }
    }

    pub fn with_outlier_filter(mut self, max_deviation: Option<Decimal>) -> Self {
        self.max_deviation = max_deviation.filter(|d| *d > Decimal::ZERO);
        self
    }

    pub fn interval_seconds(&self) -> i64 {
        self.interval_seconds
    }

    fn state_mut(&mut self, symbol: &str) -> &mut SymbolState {
        let capacity = self.capacity;
        self.states
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::new(symbol, capacity))
    }

    /// Check a price against both the active candle and the last closed close.
    ///
    /// The active candle check only kicks in after a few ticks. The last close
    /// is only a reference for the bucket right after it: after a gap the
    /// first tick re-anchors the filter.
    fn is_price_outlier(&self, symbol: &str, price: Decimal, bucket: i64) -> bool {
        let Some(max_deviation) = self.max_deviation else {
            return false;
        };
        let Some(state) = self.states.get(symbol) else {
            return false;
        };

        let deviates = |reference: Decimal| {
            reference > Decimal::ZERO && ((price - reference) / reference).abs() > max_deviation
        };

        if let Some(active) = &state.active
            && active.origin == CandleOrigin::Aggregated
            && active.tick_count >= 3
            && deviates(active.close)
        {
            return true;
        }

        state
            .latest_closed()
            .filter(|c| c.open_time + self.interval_seconds >= bucket)
            .is_some_and(|c| deviates(c.close))
    }

    /// Process one tick. `timestamp` is in Unix seconds.
    pub fn on_tick(&mut self, symbol: &str, price: Decimal, timestamp: i64) -> TickOutcome {
        let bucket = bucket_start(timestamp, self.interval_seconds);

        if self.is_price_outlier(symbol, price, bucket) {
            warn!(
                "CandleAggregator: {} OUTLIER rejected: {} (last close: {})",
                symbol,
                price,
                self.states
                    .get(symbol)
                    .and_then(|s| s.last_close())
                    .unwrap_or(Decimal::ZERO)
            );
            return TickOutcome::Outlier;
        }

        let state = self.state_mut(symbol);

        // Never reopen a bucket that is already closed
        if state.latest_bucket().is_some_and(|latest| bucket <= latest) {
            debug!(
                "CandleAggregator: {} late tick dropped (bucket {} <= closed {})",
                symbol,
                bucket,
                state.latest_bucket().unwrap_or_default()
            );
            return TickOutcome::Late;
        }

        match state.active.as_mut() {
            None => {
                info!(
                    "CandleAggregator: {} - First quote @ {}, starting aggregation",
                    symbol, price
                );
                state.active = Some(ActiveCandle::from_tick(bucket, price));
                TickOutcome::Opened
            }
            Some(active) if bucket == active.bucket => {
                active.update(price);
                TickOutcome::Updated
            }
            Some(active) if bucket < active.bucket => {
                debug!(
                    "CandleAggregator: {} out-of-order tick dropped (bucket {} < active {})",
                    symbol, bucket, active.bucket
                );
                TickOutcome::Late
            }
            Some(active) => {
                let previous = std::mem::replace(active, ActiveCandle::from_tick(bucket, price));
                if previous.origin == CandleOrigin::Shadow {
                    return TickOutcome::Opened;
                }

                let completed = previous.to_candle();
                match state.history.append(completed) {
                    AppendOutcome::Appended => {
                        debug!(
                            "CandleAggregator: {} candle completed → O:{} H:{} L:{} C:{}",
                            symbol, completed.open, completed.high, completed.low, completed.close
                        );
                        TickOutcome::Closed(completed)
                    }
                    AppendOutcome::Duplicate | AppendOutcome::Stale => TickOutcome::Opened,
                }
            }
        }
    }

    /// Process a vendor-built candle. Closed candles bypass aggregation entirely.
    pub fn on_native_candle(
        &mut self,
        symbol: &str,
        candle: Candle,
        closed: bool,
    ) -> NativeOutcome {
        let state = self.state_mut(symbol);

        if closed {
            return match state.history.append(candle) {
                AppendOutcome::Appended => {
                    // The in-progress view of this bucket (or an older one) is now obsolete
                    if state
                        .active
                        .as_ref()
                        .is_some_and(|a| a.bucket <= candle.open_time)
                    {
                        state.active = None;
                    }
                    debug!(
                        "CandleAggregator: {} native candle closed → O:{} H:{} L:{} C:{}",
                        symbol, candle.open, candle.high, candle.low, candle.close
                    );
                    NativeOutcome::Closed(candle)
                }
                AppendOutcome::Duplicate => NativeOutcome::Duplicate,
                AppendOutcome::Stale => NativeOutcome::Late,
            };
        }

        let behind_history = state
            .latest_bucket()
            .is_some_and(|latest| candle.open_time <= latest);
        let behind_active = state
            .active
            .as_ref()
            .is_some_and(|a| candle.open_time < a.bucket);
        if behind_history || behind_active {
            return NativeOutcome::Late;
        }

        state.active = Some(ActiveCandle::shadow(&candle));
        NativeOutcome::ShadowUpdated
    }

    /// Merge a warm-up batch into the symbol's history. Returns inserted count.
    ///
    /// Candles that do not start on this aggregator's bucket grid are dropped.
    pub fn merge_warmup(&mut self, symbol: &str, candles: &[Candle]) -> usize {
        let interval = self.interval_seconds;
        let aligned: Vec<Candle> = candles
            .iter()
            .filter(|c| bucket_start(c.open_time, interval) == c.open_time)
            .copied()
            .collect();
        if aligned.len() < candles.len() {
            warn!(
                "CandleAggregator: {} dropped {} warm-up candles off the {}s grid",
                symbol,
                candles.len() - aligned.len(),
                interval
            );
        }

        let state = self.state_mut(symbol);
        let inserted = state.history.merge(&aligned);

        // Keep the active bucket ahead of history
        if let (Some(active), Some(latest)) = (state.active.as_ref(), state.latest_bucket())
            && active.bucket <= latest
        {
            state.active = None;
        }

        info!(
            "CandleAggregator: {} warm-up merged {} candles ({} buffered)",
            symbol,
            inserted,
            state.history.len()
        );
        inserted
    }

    pub fn history(&self, symbol: &str) -> Option<&HistoryBuffer> {
        self.states.get(symbol).map(|s| &s.history)
    }

    pub fn active(&self, symbol: &str) -> Option<&ActiveCandle> {
        self.states.get(symbol).and_then(|s| s.active.as_ref())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }
}
