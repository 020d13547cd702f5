use crate::domain::ports::EngineListener;
use crate::domain::trading::signal::Decision;
use crate::domain::trading::types::Candle;
use tokio::sync::broadcast;

/// Engine output as seen by in-process consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    CandleClosed { symbol: String, candle: Candle },
    Decision(Decision),
}

/// Fans engine output out to any number of subscribers.
///
/// Slow receivers lag and lose the oldest events; the engine never waits.
pub struct BroadcastListener {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastListener {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EngineListener for BroadcastListener {
    fn on_candle_closed(&self, symbol: &str, candle: &Candle) {
        // No subscribers is not an error
        let _ = self.tx.send(EngineEvent::CandleClosed {
            symbol: symbol.to_string(),
            candle: *candle,
        });
    }

    fn on_decision(&self, decision: &Decision) {
        let _ = self.tx.send(EngineEvent::Decision(decision.clone()));
    }
}
