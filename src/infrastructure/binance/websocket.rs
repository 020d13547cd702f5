use super::messages::{SOURCE_NAME, SocketMessage, parse_socket_message};
use crate::domain::errors::SourceError;
use crate::domain::ports::SourceKind;
use crate::domain::trading::types::MarketEvent;
use crate::infrastructure::core::{SessionEnd, StreamSession};
use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// One connection to the combined kline stream.
pub struct BinanceKlineSession {
    url: String,
    idle_timeout: Duration,
    metrics: Option<Metrics>,
}

impl BinanceKlineSession {
    pub fn new(url: String, idle_timeout: Duration, metrics: Option<Metrics>) -> Self {
        Self {
            url,
            idle_timeout,
            metrics,
        }
    }

    fn dropped(delivered: usize, reason: impl Into<String>) -> SessionEnd {
        SessionEnd::Dropped {
            delivered,
            cause: SourceError::ConnectionClosed {
                source_name: SOURCE_NAME,
                reason: reason.into(),
            },
        }
    }

    /// Forward one text frame. `None` once the sink is closed.
    async fn handle_text(&self, text: &str, sink: &Sender<MarketEvent>) -> Option<usize> {
        match parse_socket_message(text) {
            Ok(SocketMessage::Kline(event)) => {
                if sink.send(event).await.is_err() {
                    return None;
                }
                return Some(1);
            }
            Ok(SocketMessage::Ack) => debug!("BinanceStream: subscription acknowledged"),
            Ok(SocketMessage::Ignored(stream)) => debug!("BinanceStream: ignoring {}", stream),
            Err(e) => {
                warn!("BinanceStream: dropping frame: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_malformed(SourceKind::Binance);
                }
            }
        }
        Some(0)
    }
}

#[async_trait]
impl StreamSession for BinanceKlineSession {
    fn name(&self) -> &'static str {
        "BinanceStream"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Binance
    }

    async fn run_session(&mut self, sink: &Sender<MarketEvent>) -> Result<SessionEnd> {
        info!("BinanceStream: connecting to {}", self.url);
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .context("Failed to connect to Binance WebSocket")?;
        info!("BinanceStream: connected");

        let (mut write, mut read) = ws_stream.split();
        let mut delivered = 0;

        loop {
            let frame = match tokio::time::timeout(self.idle_timeout, read.next()).await {
                Err(_) => {
                    return Ok(SessionEnd::Dropped {
                        delivered,
                        cause: SourceError::IdleTimeout {
                            source_name: SOURCE_NAME,
                            idle_secs: self.idle_timeout.as_secs(),
                        },
                    });
                }
                Ok(None) => return Ok(Self::dropped(delivered, "socket ended")),
                Ok(Some(Err(e))) => return Ok(Self::dropped(delivered, e.to_string())),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => match self.handle_text(text.as_str(), sink).await {
                    Some(n) => delivered += n,
                    None => return Ok(SessionEnd::SinkClosed),
                },
                Message::Ping(payload) => {
                    debug!("BinanceStream: ping");
                    if let Err(e) = write.send(Message::Pong(payload)).await {
                        return Ok(Self::dropped(delivered, format!("pong failed: {}", e)));
                    }
                }
                Message::Pong(_) => debug!("BinanceStream: pong"),
                Message::Close(frame) => {
                    let reason = frame
                        .map(|cf| {
                            format!("closed by server: code {} reason '{}'", cf.code, cf.reason)
                        })
                        .unwrap_or_else(|| "closed by server".to_string());
                    return Ok(Self::dropped(delivered, reason));
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn session(metrics: Option<Metrics>) -> BinanceKlineSession {
        BinanceKlineSession::new(
            "wss://stream.binance.com:9443/stream?streams=btcusdt@kline_5m".to_string(),
            Duration::from_secs(30),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_handle_text_forwards_klines_only() {
        let metrics = Metrics::new().unwrap();
        let session = session(Some(metrics.clone()));
        let (tx, mut rx) = mpsc::channel(4);

        let kline = r#"{"stream":"btcusdt@kline_5m","data":{"s":"BTCUSDT","k":{"t":1709546700000,"o":"1","h":"2","l":"0.5","c":"1.5","x":false}}}"#;
        assert_eq!(session.handle_text(kline, &tx).await, Some(1));
        assert_eq!(session.handle_text(r#"{"result":null,"id":7}"#, &tx).await, Some(0));
        assert_eq!(session.handle_text("garbage", &tx).await, Some(0));

        assert_eq!(metrics.malformed(SourceKind::Binance), 1);
        assert!(matches!(
            rx.recv().await,
            Some(MarketEvent::NativeCandle { closed: false, .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_text_reports_closed_sink() {
        let session = session(None);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let kline = r#"{"stream":"btcusdt@kline_5m","data":{"s":"BTCUSDT","k":{"t":1709546700000,"o":"1","h":"2","l":"0.5","c":"1.5","x":true}}}"#;
        assert_eq!(session.handle_text(kline, &tx).await, None);
    }

    #[tokio::test]
    async fn test_silent_socket_is_dropped_after_idle_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let kline = r#"{"stream":"btcusdt@kline_5m","data":{"s":"BTCUSDT","k":{"t":1709546700000,"o":"1","h":"2","l":"0.5","c":"1.5","x":true}}}"#;
            ws.send(Message::text(kline.to_string())).await.unwrap();
            // Keep the connection open without sending anything else
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(ws);
        });

        let mut session = BinanceKlineSession::new(
            format!("ws://{}/stream?streams=btcusdt@kline_5m", addr),
            Duration::from_millis(100),
            None,
        );
        let (tx, mut rx) = mpsc::channel(4);
        let end = session.run_session(&tx).await.unwrap();

        assert!(matches!(
            end,
            SessionEnd::Dropped {
                delivered: 1,
                cause: SourceError::IdleTimeout { .. }
            }
        ));
        assert!(matches!(rx.recv().await, Some(MarketEvent::NativeCandle { closed: true, .. })));
        server.abort();
    }
}
