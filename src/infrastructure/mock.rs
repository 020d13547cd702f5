use crate::domain::errors::SourceError;
use crate::domain::ports::{MarketDataSource, SourceKind};
use crate::domain::trading::types::{Candle, MarketEvent};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Scripted market data source for tests and offline runs.
///
/// Each scripted session is played in order; the gap between two sessions
/// behaves like a dropped connection followed by a reconnect inside the same
/// streaming task, so warm-up is never called again.
#[derive(Clone)]
pub struct MockMarketDataService {
    kind: SourceKind,
    history: Vec<Candle>,
    sessions: Vec<Vec<MarketEvent>>,
    fail_warmup: bool,
    missing_credentials: bool,
    reconnect_delay: Duration,
    warmup_calls: Arc<AtomicUsize>,
    stream_calls: Arc<AtomicUsize>,
    reconnects: Arc<AtomicUsize>,
}

impl MockMarketDataService {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            history: Vec::new(),
            sessions: Vec::new(),
            fail_warmup: false,
            missing_credentials: false,
            reconnect_delay: Duration::from_millis(10),
            warmup_calls: Arc::new(AtomicUsize::new(0)),
            stream_calls: Arc::new(AtomicUsize::new(0)),
            reconnects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Warm-up returns `count` flat, slowly rising candles starting at t=0.
    pub fn with_history(mut self, count: usize, interval_seconds: i64) -> Self {
        self.history = (0..count)
            .map(|i| {
                let close = Decimal::from(100) + Decimal::new(i as i64, 2);
                Candle::new(
                    i as i64 * interval_seconds,
                    close,
                    close,
                    close,
                    close,
                )
            })
            .collect();
        self
    }

    pub fn with_session(mut self, events: Vec<MarketEvent>) -> Self {
        self.sessions.push(events);
        self
    }

    pub fn with_failing_warmup(mut self) -> Self {
        self.fail_warmup = true;
        self
    }

    pub fn with_missing_credentials(mut self) -> Self {
        self.missing_credentials = true;
        self
    }

    pub fn warmup_calls(&self) -> usize {
        self.warmup_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn reconnects(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for MockMarketDataService {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn warmup(&self, symbol: &str) -> Result<Vec<Candle>> {
        self.warmup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_warmup {
            return Err(anyhow!("MockMarketDataService: warm-up failure for {}", symbol));
        }
        Ok(self.history.clone())
    }

    async fn stream(
        &self,
        symbols: Vec<String>,
        sink: Sender<MarketEvent>,
    ) -> Result<JoinHandle<()>> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing_credentials {
            return Err(SourceError::MissingCredentials {
                source_name: "Mock",
                name: "MOCK_API_KEY",
            }
            .into());
        }

        let sessions = self.sessions.clone();
        let reconnects = Arc::clone(&self.reconnects);
        let delay = self.reconnect_delay;
        let kind = self.kind;

        info!("MockMarketDataService: streaming {:?} ({})", symbols, kind);
        Ok(tokio::spawn(async move {
            for (index, session) in sessions.into_iter().enumerate() {
                if index > 0 {
                    warn!(
                        "MockMarketDataService: simulated disconnect, reconnecting in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    reconnects.fetch_add(1, Ordering::SeqCst);
                }
                for event in session {
                    if !symbols.iter().any(|s| s == event.symbol()) {
                        continue;
                    }
                    if sink.send(event).await.is_err() {
                        return;
                    }
                }
            }
            info!("MockMarketDataService: script finished");
        }))
    }
}
