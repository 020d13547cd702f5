use crate::domain::trading::signal::Decision;
use crate::domain::trading::types::{Candle, MarketEvent};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

/// The exchange family a symbol is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Oanda,
    Binance,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Oanda => write!(f, "oanda"),
            SourceKind::Binance => write!(f, "binance"),
        }
    }
}

/// Capability contract of one exchange adapter.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// One-shot fetch of recent closed candles used to prime the history.
    async fn warmup(&self, symbol: &str) -> Result<Vec<Candle>>;

    /// Spawn the long-lived streaming task feeding `sink`.
    ///
    /// Fails up front only for unrecoverable setup problems (e.g. missing
    /// credentials). Once spawned, the task reconnects on its own and ends
    /// when `sink` is closed.
    async fn stream(
        &self,
        symbols: Vec<String>,
        sink: Sender<MarketEvent>,
    ) -> Result<JoinHandle<()>>;
}

/// Output surface of the signal engine.
///
/// Called synchronously from the engine task; implementations must not block.
pub trait EngineListener: Send + Sync {
    fn on_candle_closed(&self, _symbol: &str, _candle: &Candle) {}

    fn on_decision(&self, decision: &Decision);
}
