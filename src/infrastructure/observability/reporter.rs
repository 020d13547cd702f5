//! Push-based metrics reporter for rustsignal
//!
//! Periodically logs a structured JSON snapshot of the pipeline counters.
//! stdout is reserved for the NDJSON record stream, so snapshots go through
//! `tracing` like every other diagnostic.

use crate::domain::ports::SourceKind;
use crate::infrastructure::observability::metrics::{Metrics, TICK_OUTCOMES};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub ticks: BTreeMap<String, u64>,
    pub candles_closed: BTreeMap<String, u64>,
    pub decisions: DecisionSnapshot,
    pub streams: BTreeMap<String, StreamSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct DecisionSnapshot {
    pub buy: u64,
    pub sell: u64,
    pub wait: u64,
}

#[derive(Debug, Serialize)]
pub struct StreamSnapshot {
    pub reconnects: u64,
    pub malformed: u64,
}

/// Push-based metrics reporter
///
/// Outputs metrics as structured JSON logs on a configurable interval.
/// No HTTP server, no incoming connections - only outbound data.
pub struct MetricsReporter {
    metrics: Metrics,
    symbols: Vec<String>,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Metrics, symbols: Vec<String>, interval_seconds: u64) -> Self {
        Self {
            metrics,
            symbols,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds.max(1)),
        }
    }

    /// Run the reporter in a loop, logging metrics periodically
    pub async fn run(self) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        loop {
            tokio::time::sleep(self.interval).await;

            let snapshot = self.collect_snapshot();
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    // Special prefix so snapshots can be filtered out of the log stream
                    info!("METRICS_JSON:{}", json);
                    info!(
                        "Signals: {} BUY / {} SELL / {} WAIT | Uptime: {}s",
                        snapshot.decisions.buy,
                        snapshot.decisions.sell,
                        snapshot.decisions.wait,
                        snapshot.uptime_seconds
                    );
                }
                Err(e) => warn!("Failed to serialize metrics: {}", e),
            }
        }
    }

    fn collect_snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        self.metrics.uptime_seconds.set(uptime as f64);

        let ticks = TICK_OUTCOMES
            .iter()
            .map(|outcome| (outcome.to_string(), self.metrics.ticks(outcome)))
            .collect();

        let candles_closed = self
            .symbols
            .iter()
            .map(|symbol| (symbol.clone(), self.metrics.candles_closed(symbol)))
            .collect();

        let streams = [SourceKind::Oanda, SourceKind::Binance]
            .into_iter()
            .map(|source| {
                (
                    source.to_string(),
                    StreamSnapshot {
                        reconnects: self.metrics.reconnects(source),
                        malformed: self.metrics.malformed(source),
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            ticks,
            candles_closed,
            decisions: DecisionSnapshot {
                buy: self.metrics.decisions("SIGNAL", "BUY"),
                sell: self.metrics.decisions("SIGNAL", "SELL"),
                wait: self.metrics.decisions("WAIT", "NONE"),
            },
            streams,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot_collection() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_ticks("updated");
        metrics.inc_ticks("updated");
        metrics.inc_candles_closed("EUR_USD");
        metrics.inc_decisions("SIGNAL", "BUY");
        metrics.inc_malformed(SourceKind::Oanda);

        let reporter = MetricsReporter::new(metrics, vec!["EUR_USD".to_string()], 60);
        let snapshot = reporter.collect_snapshot();

        assert_eq!(snapshot.ticks["updated"], 2);
        assert_eq!(snapshot.ticks["late"], 0);
        assert_eq!(snapshot.candles_closed["EUR_USD"], 1);
        assert_eq!(snapshot.decisions.buy, 1);
        assert_eq!(snapshot.streams["oanda"].malformed, 1);
        assert!(!snapshot.timestamp.is_empty());
    }

    #[test]
    fn test_snapshot_serialization() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        let reporter = MetricsReporter::new(metrics, vec!["BTCUSDT".to_string()], 60);

        let json =
            serde_json::to_string(&reporter.collect_snapshot()).expect("Failed to serialize");
        assert!(json.contains("\"BTCUSDT\":0"));
        assert!(json.contains("\"binance\""));
    }
}
