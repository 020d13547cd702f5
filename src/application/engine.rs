use crate::application::market_data::candle_aggregator::{
    CandleAggregator, NativeOutcome, TickOutcome,
};
use crate::application::signals::decision_engine::DecisionEngine;
use crate::domain::market::history::HistoryBuffer;
use crate::domain::ports::EngineListener;
use crate::domain::trading::signal::Decision;
use crate::domain::trading::types::{ActiveCandle, Candle};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of feeding one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub decision: Option<Decision>,
}

/// Result of feeding one native candle.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleReport {
    pub outcome: NativeOutcome,
    pub decision: Option<Decision>,
}

/// The core: aggregation, history, indicators and decisions for every symbol.
///
/// Exactly one task drives it, so every symbol has a single writer and
/// indicators are read right after the append that triggered them.
pub struct SignalEngine {
    aggregator: CandleAggregator,
    decisions: DecisionEngine,
    listeners: Vec<Arc<dyn EngineListener>>,
}

impl SignalEngine {
    pub fn new(aggregator: CandleAggregator, decisions: DecisionEngine) -> Self {
        Self {
            aggregator,
            decisions,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Arc<dyn EngineListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn feed_tick(&mut self, symbol: &str, price: Decimal, timestamp: i64) -> TickReport {
        let outcome = self.aggregator.on_tick(symbol, price, timestamp);
        let decision = match &outcome {
            TickOutcome::Closed(candle) => Some(self.on_close(symbol, candle)),
            _ => None,
        };
        TickReport { outcome, decision }
    }

    pub fn feed_native_candle(
        &mut self,
        symbol: &str,
        candle: Candle,
        closed: bool,
    ) -> CandleReport {
        let outcome = self.aggregator.on_native_candle(symbol, candle, closed);
        let decision = match &outcome {
            NativeOutcome::Closed(candle) => Some(self.on_close(symbol, candle)),
            NativeOutcome::Duplicate => {
                debug!("SignalEngine: {} duplicate close @ {} ignored", symbol, candle.open_time);
                None
            }
            _ => None,
        };
        CandleReport { outcome, decision }
    }

    /// Prime history. Never produces a decision.
    pub fn load_warmup(&mut self, symbol: &str, candles: &[Candle]) -> usize {
        self.aggregator.merge_warmup(symbol, candles)
    }

    pub fn history(&self, symbol: &str) -> Option<&HistoryBuffer> {
        self.aggregator.history(symbol)
    }

    pub fn active(&self, symbol: &str) -> Option<&ActiveCandle> {
        self.aggregator.active(symbol)
    }

    pub fn interval_seconds(&self) -> i64 {
        self.aggregator.interval_seconds()
    }

    fn on_close(&self, symbol: &str, candle: &Candle) -> Decision {
        for listener in &self.listeners {
            listener.on_candle_closed(symbol, candle);
        }

        let snapshot = self
            .aggregator
            .history(symbol)
            .map(HistoryBuffer::snapshot)
            .unwrap_or_default();
        let decision = self.decisions.decide(symbol, snapshot);

        match &decision {
            Decision::Signal(signal) => info!(
                "SignalEngine: {} {} @ {} SL:{} TP:{}/{}/{} ({})",
                symbol,
                signal.direction,
                signal.entry_price,
                signal.stop_loss,
                signal.tp1,
                signal.tp2,
                signal.tp3,
                signal.reason
            ),
            Decision::Wait(wait) => debug!("SignalEngine: {} WAIT ({})", symbol, wait.reason),
        }

        for listener in &self.listeners {
            listener.on_decision(&decision);
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::signals::decision_engine::DecisionConfig;
    use crate::domain::trading::signal::WaitReason;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        candles: Mutex<Vec<(String, Candle)>>,
        decisions: Mutex<Vec<Decision>>,
    }

    impl EngineListener for Recorder {
        fn on_candle_closed(&self, symbol: &str, candle: &Candle) {
            self.candles
                .lock()
                .unwrap()
                .push((symbol.to_string(), *candle));
        }

        fn on_decision(&self, decision: &Decision) {
            self.decisions.lock().unwrap().push(decision.clone());
        }
    }

    fn engine() -> SignalEngine {
        SignalEngine::new(
            CandleAggregator::new(300, 300),
            DecisionEngine::new(DecisionConfig::default()),
        )
    }

    #[test]
    fn test_close_notifies_candle_then_decision() {
        let mut engine = engine();
        let recorder = Arc::new(Recorder::default());
        engine.subscribe(recorder.clone());

        engine.feed_tick("EUR_USD", dec!(1.1), 0);
        let report = engine.feed_tick("EUR_USD", dec!(1.2), 300);

        assert!(matches!(report.outcome, TickOutcome::Closed(_)));
        let decision = report.decision.unwrap();
        assert!(matches!(
            decision.as_wait().unwrap().reason,
            WaitReason::InsufficientHistory { have: 1, .. }
        ));
        assert_eq!(recorder.candles.lock().unwrap().len(), 1);
        assert_eq!(recorder.decisions.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_warmup_never_decides() {
        let mut engine = engine();
        let recorder = Arc::new(Recorder::default());
        engine.subscribe(recorder.clone());

        let candles: Vec<Candle> = (0..5)
            .map(|i| Candle::new(i * 300, dec!(1), dec!(1), dec!(1), dec!(1)))
            .collect();
        assert_eq!(engine.load_warmup("EUR_USD", &candles), 5);
        assert!(recorder.decisions.lock().unwrap().is_empty());
        assert_eq!(engine.history("EUR_USD").unwrap().len(), 5);
    }

    #[test]
    fn test_duplicate_native_close_is_not_redecided() {
        let mut engine = engine();
        let recorder = Arc::new(Recorder::default());
        engine.subscribe(recorder.clone());

        let candle = Candle::new(0, dec!(1), dec!(2), dec!(1), dec!(2));
        assert!(engine.feed_native_candle("BTCUSDT", candle, true).decision.is_some());
        let replay = engine.feed_native_candle("BTCUSDT", candle, true);
        assert_eq!(replay.outcome, NativeOutcome::Duplicate);
        assert!(replay.decision.is_none());
        assert_eq!(recorder.decisions.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_open_native_candle_does_not_decide() {
        let mut engine = engine();
        let candle = Candle::new(0, dec!(1), dec!(2), dec!(1), dec!(2));
        let report = engine.feed_native_candle("BTCUSDT", candle, false);
        assert_eq!(report.outcome, NativeOutcome::ShadowUpdated);
        assert!(report.decision.is_none());
        assert!(engine.history("BTCUSDT").unwrap().is_empty());
    }
}
