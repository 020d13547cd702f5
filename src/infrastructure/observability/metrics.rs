//! Prometheus metrics definitions for rustsignal
//!
//! All metrics use the `rustsignal_` prefix and are read-only.

use crate::domain::ports::{EngineListener, SourceKind};
use crate::domain::trading::signal::Decision;
use crate::domain::trading::types::Candle;
use prometheus::{
    CounterVec, Gauge, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Tick outcome labels, in the order the reporter prints them.
pub const TICK_OUTCOMES: [&str; 5] = ["opened", "updated", "closed", "late", "outlier"];

/// Prometheus metrics for the signal pipeline
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Ticks fed to the aggregator, by outcome
    pub ticks_total: CounterVec,
    /// Candles appended to history, by symbol
    pub candles_closed_total: CounterVec,
    /// Decisions emitted, by status and direction
    pub decisions_total: CounterVec,
    /// Stream reconnection attempts, by source
    pub stream_reconnects_total: CounterVec,
    /// Payloads dropped as malformed, by source
    pub malformed_messages_total: CounterVec,
    /// Uptime in seconds
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks_total = CounterVec::new(
            Opts::new("rustsignal_ticks_total", "Ticks processed by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(ticks_total.clone()))?;

        let candles_closed_total = CounterVec::new(
            Opts::new(
                "rustsignal_candles_closed_total",
                "Closed candles appended to history",
            ),
            &["symbol"],
        )?;
        registry.register(Box::new(candles_closed_total.clone()))?;

        let decisions_total = CounterVec::new(
            Opts::new(
                "rustsignal_decisions_total",
                "Decisions emitted by status and direction",
            ),
            &["status", "direction"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let stream_reconnects_total = CounterVec::new(
            Opts::new(
                "rustsignal_stream_reconnects_total",
                "Total stream reconnection attempts",
            ),
            &["source"],
        )?;
        registry.register(Box::new(stream_reconnects_total.clone()))?;

        let malformed_messages_total = CounterVec::new(
            Opts::new(
                "rustsignal_malformed_messages_total",
                "Vendor payloads dropped as malformed",
            ),
            &["source"],
        )?;
        registry.register(Box::new(malformed_messages_total.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "rustsignal_uptime_seconds",
            "Server uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            ticks_total,
            candles_closed_total,
            decisions_total,
            stream_reconnects_total,
            malformed_messages_total,
            uptime_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_ticks(&self, outcome: &str) {
        self.ticks_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_candles_closed(&self, symbol: &str) {
        self.candles_closed_total.with_label_values(&[symbol]).inc();
    }

    pub fn inc_decisions(&self, status: &str, direction: &str) {
        self.decisions_total
            .with_label_values(&[status, direction])
            .inc();
    }

    pub fn inc_reconnects(&self, source: SourceKind) {
        self.stream_reconnects_total
            .with_label_values(&[source.to_string()])
            .inc();
    }

    pub fn inc_malformed(&self, source: SourceKind) {
        self.malformed_messages_total
            .with_label_values(&[source.to_string()])
            .inc();
    }

    pub fn ticks(&self, outcome: &str) -> u64 {
        self.ticks_total.with_label_values(&[outcome]).get() as u64
    }

    pub fn candles_closed(&self, symbol: &str) -> u64 {
        self.candles_closed_total.with_label_values(&[symbol]).get() as u64
    }

    pub fn decisions(&self, status: &str, direction: &str) -> u64 {
        self.decisions_total
            .with_label_values(&[status, direction])
            .get() as u64
    }

    pub fn reconnects(&self, source: SourceKind) -> u64 {
        self.stream_reconnects_total
            .with_label_values(&[source.to_string()])
            .get() as u64
    }

    pub fn malformed(&self, source: SourceKind) -> u64 {
        self.malformed_messages_total
            .with_label_values(&[source.to_string()])
            .get() as u64
    }
}

/// Feeds candle and decision counters from the engine's output surface.
pub struct MetricsListener {
    metrics: Metrics,
}

impl MetricsListener {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl EngineListener for MetricsListener {
    fn on_candle_closed(&self, symbol: &str, _candle: &Candle) {
        self.metrics.inc_candles_closed(symbol);
    }

    fn on_decision(&self, decision: &Decision) {
        self.metrics
            .inc_decisions(decision.status_label(), &decision.direction().to_string());
    }
}
