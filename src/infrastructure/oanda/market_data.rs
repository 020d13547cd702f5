//! OANDA Market Data Source
//!
//! - Warm-up from `v3/instruments/{instrument}/candles` (midpoint, complete only)
//! - Live midpoint ticks from the chunked `v3/accounts/{id}/pricing/stream`

use super::messages::{LineBuffer, SOURCE_NAME, StreamLine, parse_candles, parse_stream_line};
use crate::config::{OandaConfig, StreamEnvConfig};
use crate::domain::errors::SourceError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::{MarketDataSource, SourceKind};
use crate::domain::trading::types::{Candle, MarketEvent};
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use crate::infrastructure::core::{ReconnectBackoff, SessionEnd, StreamSession, run_with_reconnect};
use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest_middleware::ClientWithMiddleware;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Largest `count` the candles endpoint accepts.
const MAX_CANDLE_COUNT: usize = 5000;

pub struct OandaMarketDataSource {
    config: OandaConfig,
    stream_config: StreamEnvConfig,
    timeframe: Timeframe,
    warmup_limit: usize,
    client: ClientWithMiddleware,
    metrics: Option<Metrics>,
}

impl OandaMarketDataSource {
    pub fn new(
        config: OandaConfig,
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

    fn candles_url(&self, instrument: &str) -> Result<String> {
        // The newest candle is usually still forming and gets filtered out.
        let count = (self.warmup_limit + 1).min(MAX_CANDLE_COUNT).to_string();
        let base = format!(
            "{}/v3/instruments/{}/candles",
            self.config.api_base_url.trim_end_matches('/'),
            instrument
        );
        build_url_with_query(
            &base,
            &[
                ("granularity", self.timeframe.to_oanda_string()),
                ("count", count.as_str()),
                ("price", "M"),
                // Same UTC epoch grid as bucket_start, not New York 17:00
                ("alignmentTimezone", "UTC"),
                ("dailyAlignment", "0"),
            ],
        )
    }

    fn pricing_stream_url(&self, account_id: &str, instruments: &[String]) -> Result<String> {
        let base = format!(
            "{}/v3/accounts/{}/pricing/stream",
            self.config.stream_base_url.trim_end_matches('/'),
            account_id
        );
        build_url_with_query(&base, &[("instruments", instruments.join(","))])
    }
}

#[async_trait]
impl MarketDataSource for OandaMarketDataSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Oanda
    }

    async fn warmup(&self, symbol: &str) -> Result<Vec<Candle>> {
        let api_key = self.config.require_api_key()?;
        let url = self.candles_url(symbol)?;

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .context("Failed to fetch candles from OANDA")?;

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
            .context("Failed to read OANDA candles response")?;
        let candles = parse_candles(&body)?;

        info!(
            "OandaMarketData: fetched {} warm-up candles for {}",
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
        let api_key = self.config.require_api_key()?.to_string();
        let account_id = self.config.require_account_id()?;
        if symbols.is_empty() {
            anyhow::bail!("OandaStream: no instruments to stream");
        }

        let url = self.pricing_stream_url(account_id, &symbols)?;
        info!("OandaStream: streaming prices for {}", symbols.join(","));

        let session = PricingSession {
            client: HttpClientFactory::create_streaming_client(),
            url,
            api_key,
            idle_timeout: self.stream_config.idle_timeout,
            metrics: self.metrics.clone(),
        };
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

/// One long-lived pricing stream request.
struct PricingSession {
    client: Client,
    url: String,
    api_key: String,
    idle_timeout: Duration,
    metrics: Option<Metrics>,
}

#[async_trait]
impl StreamSession for PricingSession {
    fn name(&self) -> &'static str {
        "OandaStream"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Oanda
    }

    async fn run_session(&mut self, sink: &Sender<MarketEvent>) -> Result<SessionEnd> {
        let response = self
            .client
            .get(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .context("Failed to connect to OANDA pricing stream")?;

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

        info!("OandaStream: connected");
        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut delivered = 0;

        loop {
            let chunk = match tokio::time::timeout(self.idle_timeout, body.next()).await {
                Err(_) => {
                    return Ok(SessionEnd::Dropped {
                        delivered,
                        cause: SourceError::IdleTimeout {
                            source_name: SOURCE_NAME,
                            idle_secs: self.idle_timeout.as_secs(),
                        },
                    });
                }
                Ok(None) => {
                    return Ok(SessionEnd::Dropped {
                        delivered,
                        cause: SourceError::ConnectionClosed {
                            source_name: SOURCE_NAME,
                            reason: "response body ended".to_string(),
                        },
                    });
                }
                Ok(Some(Err(e))) => {
                    return Ok(SessionEnd::Dropped {
                        delivered,
                        cause: SourceError::ConnectionClosed {
                            source_name: SOURCE_NAME,
                            reason: e.to_string(),
                        },
                    });
                }
                Ok(Some(Ok(bytes))) => bytes,
            };

            match forward_lines(lines.push(&chunk), sink, self.metrics.as_ref()).await {
                Some(n) => delivered += n,
                None => return Ok(SessionEnd::SinkClosed),
            }
        }
    }
}

/// Decode and forward complete lines. `None` once the sink is closed.
async fn forward_lines(
    lines: Vec<String>,
    sink: &Sender<MarketEvent>,
    metrics: Option<&Metrics>,
) -> Option<usize> {
    let mut forwarded = 0;
    for line in lines {
        match parse_stream_line(&line) {
            Ok(StreamLine::Price(event)) => {
                if sink.send(event).await.is_err() {
                    return None;
                }
                forwarded += 1;
            }
            Ok(StreamLine::Heartbeat) => debug!("OandaStream: heartbeat"),
            Ok(StreamLine::Ignored(what)) => debug!("OandaStream: ignoring {}", what),
            Err(e) => {
                warn!("OandaStream: dropping line: {}", e);
                if let Some(metrics) = metrics {
                    metrics.inc_malformed(SourceKind::Oanda);
                }
            }
        }
    }
    Some(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn source(config: OandaConfig) -> OandaMarketDataSource {
        OandaMarketDataSource::new(config, StreamEnvConfig::default(), Timeframe::FiveMin, 300)
    }

    fn practice_config() -> OandaConfig {
        OandaConfig {
            api_base_url: "https://api-fxpractice.oanda.com/".to_string(),
            stream_base_url: "https://stream-fxpractice.oanda.com".to_string(),
            api_key: "token".to_string(),
            account_id: "101-004-1234567-001".to_string(),
        }
    }

    #[test]
    fn test_candles_url() {
        let url = source(practice_config()).candles_url("EUR_USD").unwrap();
        assert_eq!(
            url,
            "https://api-fxpractice.oanda.com/v3/instruments/EUR_USD/candles?granularity=M5&count=301&price=M&alignmentTimezone=UTC&dailyAlignment=0"
        );
    }

    #[test]
    fn test_daily_candles_align_to_utc_midnight() {
        let oanda = OandaMarketDataSource::new(
            practice_config(),
            StreamEnvConfig::default(),
            Timeframe::FourHour,
            300,
        );
        let url = oanda.candles_url("XAU_USD").unwrap();
        assert!(url.contains("granularity=H4"));
        assert!(url.contains("alignmentTimezone=UTC"));
        assert!(url.contains("dailyAlignment=0"));
    }

    #[test]
    fn test_pricing_stream_url_encodes_instrument_list() {
        let instruments = vec!["EUR_USD".to_string(), "XAU_USD".to_string()];
        let url = source(practice_config())
            .pricing_stream_url("101-004-1234567-001", &instruments)
            .unwrap();
        assert!(url.starts_with(
            "https://stream-fxpractice.oanda.com/v3/accounts/101-004-1234567-001/pricing/stream?"
        ));
        assert!(url.ends_with("instruments=EUR_USD%2CXAU_USD"));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_connecting() {
        let oanda = source(OandaConfig::default());
        let (tx, _rx) = mpsc::channel(1);

        let err = oanda.stream(vec!["EUR_USD".to_string()], tx).await.unwrap_err();
        assert!(err.to_string().contains("OANDA_API_KEY"));

        let err = oanda.warmup("EUR_USD").await.unwrap_err();
        assert!(err.to_string().contains("OANDA_API_KEY"));

        let mut config = practice_config();
        config.account_id.clear();
        let (tx, _rx) = mpsc::channel(1);
        let err = source(config).stream(vec!["EUR_USD".to_string()], tx).await.unwrap_err();
        assert!(err.to_string().contains("OANDA_ACCOUNT_ID"));
    }

    #[tokio::test]
    async fn test_forward_lines_skips_noise_and_counts_malformed() {
        let metrics = Metrics::new().unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let lines = vec![
            r#"{"type":"HEARTBEAT","time":"2024-03-04T10:15:35Z"}"#.to_string(),
            "{broken".to_string(),
            r#"{"type":"PRICE","time":"2024-03-04T10:15:36Z","bids":[{"price":"1.1000"}],"asks":[{"price":"1.1002"}],"instrument":"EUR_USD"}"#.to_string(),
        ];

        let forwarded = forward_lines(lines, &tx, Some(&metrics)).await;
        assert_eq!(forwarded, Some(1));
        assert_eq!(metrics.malformed(SourceKind::Oanda), 1);

        match rx.recv().await.unwrap() {
            MarketEvent::Tick { symbol, price, .. } => {
                assert_eq!(symbol, "EUR_USD");
                assert_eq!(price, dec!(1.1001));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forward_lines_reports_closed_sink() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let lines = vec![
            r#"{"type":"PRICE","time":"2024-03-04T10:15:36Z","bids":[{"price":"1.1"}],"asks":[{"price":"1.1"}],"instrument":"EUR_USD"}"#.to_string(),
        ];
        assert_eq!(forward_lines(lines, &tx, None).await, None);
    }

    #[tokio::test]
    async fn test_silent_stream_is_dropped_after_idle_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await.unwrap();

            let line = concat!(
                r#"{"type":"PRICE","time":"2024-03-04T10:15:36Z","bids":[{"price":"1.1000"}],"asks":[{"price":"1.1002"}],"instrument":"EUR_USD"}"#,
                "\n"
            );
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
                line.len(),
                line
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            // Keep the connection open without sending anything else
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut session = PricingSession {
            client: Client::builder().no_proxy().build().unwrap(),
            url: format!("http://{}/v3/accounts/101-004-1234567-001/pricing/stream", addr),
            api_key: "token".to_string(),
            idle_timeout: Duration::from_millis(100),
            metrics: None,
        };
        let (tx, mut rx) = mpsc::channel(4);
        let end = session.run_session(&tx).await.unwrap();

        assert!(matches!(
            end,
            SessionEnd::Dropped {
                delivered: 1,
                cause: SourceError::IdleTimeout { .. }
            }
        ));
        assert!(matches!(rx.recv().await, Some(MarketEvent::Tick { .. })));
        server.abort();
    }
}
