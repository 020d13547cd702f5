use crate::application::engine::SignalEngine;
use crate::domain::trading::types::MarketEvent;
use crate::infrastructure::observability::Metrics;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info};

/// The single writer of all symbol state.
///
/// Every adapter sends into one channel; this task is the only consumer, so
/// events of one symbol are applied strictly in arrival order.
pub struct EngineAgent {
    engine: SignalEngine,
    market_rx: Receiver<MarketEvent>,
    metrics: Option<Metrics>,
}

impl EngineAgent {
    pub fn new(engine: SignalEngine, market_rx: Receiver<MarketEvent>) -> Self {
        Self {
            engine,
            market_rx,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Consume events until every sender is dropped, then hand the engine back.
    pub async fn run(mut self) -> SignalEngine {
        info!(
            "EngineAgent started ({}s candles, {} listeners)",
            self.engine.interval_seconds(),
            self.engine.listener_count()
        );

        while let Some(event) = self.market_rx.recv().await {
            self.handle(event);
        }

        info!("EngineAgent: market channel closed, stopping");
        self.engine
    }

    pub fn handle(&mut self, event: MarketEvent) {
        match event {
            MarketEvent::Tick {
                symbol,
                price,
                timestamp,
            } => {
                let report = self.engine.feed_tick(&symbol, price, timestamp);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_ticks(report.outcome.label());
                }
            }
            MarketEvent::NativeCandle {
                symbol,
                candle,
                closed,
            } => {
                self.engine.feed_native_candle(&symbol, candle, closed);
            }
            MarketEvent::Warmup { symbol, candles } => {
                let inserted = self.engine.load_warmup(&symbol, &candles);
                debug!(
                    "EngineAgent: {} warm-up applied ({} of {} new)",
                    symbol,
                    inserted,
                    candles.len()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::market_data::candle_aggregator::CandleAggregator;
    use crate::application::signals::decision_engine::DecisionEngine;
    use crate::domain::trading::types::Candle;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    fn engine() -> SignalEngine {
        SignalEngine::new(CandleAggregator::new(300, 300), DecisionEngine::default())
    }

    #[tokio::test]
    async fn test_agent_applies_events_in_order() {
        let (tx, rx) = mpsc::channel(16);
        let metrics = Metrics::new().unwrap();
        let agent = EngineAgent::new(engine(), rx).with_metrics(metrics.clone());
        let handle = tokio::spawn(agent.run());

        let warmup: Vec<Candle> = (0..3)
            .map(|i| Candle::new(i * 300, dec!(1), dec!(1), dec!(1), dec!(1)))
            .collect();
        tx.send(MarketEvent::Warmup {
            symbol: "EUR_USD".to_string(),
            candles: warmup,
        })
        .await
        .unwrap();
        for (price, ts) in [(dec!(1.1), 900), (dec!(1.2), 1000), (dec!(1.3), 1200)] {
            tx.send(MarketEvent::Tick {
                symbol: "EUR_USD".to_string(),
                price,
                timestamp: ts,
            })
            .await
            .unwrap();
        }
        drop(tx);

        let engine = handle.await.unwrap();
        assert_eq!(engine.history("EUR_USD").unwrap().len(), 4);
        assert_eq!(engine.active("EUR_USD").unwrap().bucket, 1200);
        assert_eq!(metrics.ticks("opened"), 1);
        assert_eq!(metrics.ticks("updated"), 1);
        assert_eq!(metrics.ticks("closed"), 1);
    }

    #[tokio::test]
    async fn test_agent_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel::<MarketEvent>(1);
        drop(tx);
        let engine = EngineAgent::new(engine(), rx).run().await;
        assert!(engine.history("EUR_USD").is_none());
    }
}
