//! Binance Market Data Source
//!
//! Provides market data for Binance spot symbols:
//! - Warm-up candles from the public klines endpoint
//! - Native 5m/15m/... klines from the combined WebSocket stream

use super::messages::{SOURCE_NAME, combined_stream_url, parse_klines};
use super::websocket::BinanceKlineSession;
use crate::config::{BinanceConfig, StreamEnvConfig};
use crate::domain::errors::SourceError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::{MarketDataSource, SourceKind};
use crate::domain::trading::types::{Candle, MarketEvent};
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use crate::infrastructure::core::{ReconnectBackoff, run_with_reconnect};
use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::info;

/// Largest `limit` the klines endpoint accepts.
const MAX_KLINES: usize = 1000;

pub struct BinanceMarketDataSource {
    config: BinanceConfig,
    stream_config: StreamEnvConfig,
    timeframe: Timeframe,
    warmup_limit: usize,
    client: ClientWithMiddleware,
    metrics: Option<Metrics>,
}

impl BinanceMarketDataSource {
    pub fn new(
        config: BinanceConfig,
        stream_config: StreamEnvConfig,
        timeframe: Timeframe,
        warmup_limit: usize,
    ) -> Self {
        Self {
            config,
            stream_config,
            timeframe,
            warmup_limit,
            client: HttpClientFactory::create_client(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn klines_url(&self, symbol: &str) -> Result<String> {
        // One extra row for the kline that is still open.
        let limit = (self.warmup_limit + 1).min(MAX_KLINES).to_string();
        let base = format!("{}/api/v3/klines", self.config.base_url.trim_end_matches('/'));
        build_url_with_query(
            &base,
            &[
                ("symbol", symbol),
                ("interval", self.timeframe.to_binance_string()),
                ("limit", limit.as_str()),
            ],
        )
    }
}

#[async_trait]
impl MarketDataSource for BinanceMarketDataSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Binance
    }

    async fn warmup(&self, symbol: &str) -> Result<Vec<Candle>> {
        let url = self.klines_url(symbol)?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch klines from Binance")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::HttpStatus {
                source_name: SOURCE_NAME,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body = response
            .text()
            .await
            .context("Failed to read Binance klines response")?;
        let candles = parse_klines(&body)?;

        info!(
            "BinanceMarketData: fetched {} warm-up candles for {}",
            candles.len(),
            symbol
        );
        Ok(candles)
    }

    async fn stream(
        &self,
        symbols: Vec<String>,
        sink: Sender<MarketEvent>,
    ) -> Result<JoinHandle<()>> {
        if symbols.is_empty() {
            anyhow::bail!("BinanceStream: no symbols to stream");
        }

        let url = combined_stream_url(
            &self.config.ws_url,
            &symbols,
            self.timeframe.to_binance_string(),
        );
        info!(
            "BinanceStream: streaming {} klines for {}",
            self.timeframe.to_binance_string(),
            symbols.join(",")
        );

        let session =
            BinanceKlineSession::new(url, self.stream_config.idle_timeout, self.metrics.clone());
        let backoff = ReconnectBackoff::new(
            self.stream_config.initial_backoff,
            self.stream_config.max_backoff,
        );

        Ok(tokio::spawn(run_with_reconnect(
            session,
            backoff,
            self.metrics.clone(),
            sink,
        )))
    }
}
