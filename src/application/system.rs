use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{
    agents::{engine_agent::EngineAgent, warmup_service::WarmupService},
    engine::SignalEngine,
    market_data::candle_aggregator::CandleAggregator,
    routing::SymbolRouter,
    signals::decision_engine::DecisionEngine,
};
use crate::config::Config;
use crate::domain::ports::{EngineListener, MarketDataSource};
use crate::infrastructure::binance::BinanceMarketDataSource;
use crate::infrastructure::oanda::OandaMarketDataSource;
use crate::infrastructure::observability::{Metrics, MetricsListener, MetricsReporter};

/// Buffer between the adapters and the engine task.
const MARKET_CHANNEL_CAPACITY: usize = 1024;

pub struct Application {
    config: Config,
    sources: Vec<Arc<dyn MarketDataSource>>,
    metrics: Metrics,
}

/// Running tasks of a started [`Application`].
pub struct AppHandle {
    engine: JoinHandle<SignalEngine>,
    streams: Vec<JoinHandle<()>>,
    reporter: Option<JoinHandle<()>>,
}

impl AppHandle {
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Wait for every stream to end on its own, then for the engine to drain.
    pub async fn join(self) -> Result<SignalEngine> {
        for stream in self.streams {
            if let Err(e) = stream.await {
                warn!("Application: stream task ended abnormally: {}", e);
            }
        }
        Self::finish(self.engine, self.reporter).await
    }

    /// Stop the streams and return the engine once queued events are applied.
    pub async fn shutdown(self) -> Result<SignalEngine> {
        info!("Application: shutting down {} streams", self.streams.len());
        for stream in &self.streams {
            stream.abort();
        }
        Self::finish(self.engine, self.reporter).await
    }

    async fn finish(
        engine: JoinHandle<SignalEngine>,
        reporter: Option<JoinHandle<()>>,
    ) -> Result<SignalEngine> {
        let engine = engine.await.context("Engine task failed")?;
        if let Some(reporter) = reporter {
            reporter.abort();
        }
        Ok(engine)
    }
}

impl Application {
    /// Wire the real OANDA and Binance adapters.
    pub fn build(config: Config) -> Result<Self> {
        info!(
            "Building rustsignal ({} candles, symbols: {})",
            config.timeframe().to_binance_string(),
            config.symbols.join(",")
        );
        let metrics = Metrics::new().context("Failed to initialize metrics")?;

        let oanda = OandaMarketDataSource::new(
            config.oanda.clone(),
            config.stream.clone(),
            config.timeframe(),
            config.warmup_limit(),
        )
        .with_metrics(metrics.clone());

        let binance = BinanceMarketDataSource::new(
            config.binance.clone(),
            config.stream.clone(),
            config.timeframe(),
            config.warmup_limit(),
        )
        .with_metrics(metrics.clone());

        Ok(Self {
            config,
            sources: vec![Arc::new(oanda), Arc::new(binance)],
            metrics,
        })
    }

    /// Wire caller-provided adapters (tests, offline replays).
    pub fn with_sources(config: Config, sources: Vec<Arc<dyn MarketDataSource>>) -> Result<Self> {
        let metrics = Metrics::new().context("Failed to initialize metrics")?;
        Ok(Self {
            config,
            sources,
            metrics,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Route symbols, warm up, then start the engine and every adapter stream.
    ///
    /// Warm-up events are queued before any stream is opened, so the engine
    /// merges history ahead of the first live event. An adapter that cannot
    /// start is logged and skipped.
    pub async fn start(&self, listeners: Vec<Arc<dyn EngineListener>>) -> Result<AppHandle> {
        let router = SymbolRouter::new(&self.config.symbols);
        if router.routes().is_empty() {
            anyhow::bail!(
                "No routable symbols in [{}]",
                self.config.symbols.join(",")
            );
        }

        let decision_config = self.config.decision_config();
        let min_history = decision_config.min_history();

        let aggregator = CandleAggregator::new(
            self.config.interval_seconds(),
            self.config.signal.history_capacity,
        )
        .with_outlier_filter(self.config.signal.max_tick_deviation);

        let mut engine = SignalEngine::new(aggregator, DecisionEngine::new(decision_config));
        engine.subscribe(Arc::new(MetricsListener::new(self.metrics.clone())));
        for listener in listeners {
            engine.subscribe(listener);
        }

        let (market_tx, market_rx) = mpsc::channel(MARKET_CHANNEL_CAPACITY);
        let agent = EngineAgent::new(engine, market_rx).with_metrics(self.metrics.clone());
        let engine_handle = tokio::spawn(agent.run());

        let warmups = WarmupService::new(&self.sources, min_history)
            .warmup_all(router.routes())
            .await;
        info!(
            "Application: warm-up complete for {}/{} symbols",
            warmups.len(),
            router.routes().len()
        );
        for event in warmups {
            market_tx
                .send(event)
                .await
                .context("Engine stopped during warm-up")?;
        }

        let mut streams = Vec::new();
        for source in &self.sources {
            let symbols = router.symbols_for(source.kind());
            if symbols.is_empty() {
                continue;
            }
            match source.stream(symbols, market_tx.clone()).await {
                Ok(handle) => {
                    info!("Application: {} stream started", source.kind());
                    streams.push(handle);
                }
                Err(e) => error!("Application: {} stream unavailable: {:#}", source.kind(), e),
            }
        }
        // Only the streams keep the engine channel open from here on.
        drop(market_tx);

        if streams.is_empty() {
            warn!("Application: no market data stream is running");
        }

        let reporter = self.config.observability.enabled.then(|| {
            let reporter = MetricsReporter::new(
                self.metrics.clone(),
                router.symbols(),
                self.config.observability.interval_seconds,
            );
            tokio::spawn(reporter.run())
        });

        Ok(AppHandle {
            engine: engine_handle,
            streams,
            reporter,
        })
    }
}
