use crate::domain::errors::SourceError;
use crate::domain::trading::types::{Candle, MarketEvent};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

pub(super) const SOURCE_NAME: &str = "Binance";

/// A decoded combined-stream socket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketMessage {
    Kline(MarketEvent),
    /// `{"result":null,"id":..}` reply to a subscription request.
    Ack,
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    stream: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct KlineEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    kline: Kline,
}

#[derive(Debug, Deserialize)]
struct Kline {
    /// Open time, epoch milliseconds
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "x")]
    closed: bool,
}

fn malformed(reason: impl Into<String>) -> SourceError {
    SourceError::Malformed {
        source_name: SOURCE_NAME,
        reason: reason.into(),
    }
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, SourceError> {
    Decimal::from_str(raw).map_err(|e| malformed(format!("{} '{}': {}", field, raw, e)))
}

/// `<symbol>@kline_<interval>` names joined for the `/stream?streams=` endpoint.
pub fn combined_stream_url(ws_url: &str, symbols: &[String], interval: &str) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@kline_{}", s.to_lowercase(), interval))
        .collect();
    format!(
        "{}/stream?streams={}",
        ws_url.trim_end_matches('/'),
        streams.join("/")
    )
}

pub fn parse_socket_message(text: &str) -> Result<SocketMessage, SourceError> {
    let value: Value = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;

    if value.get("result").is_some() && value.get("stream").is_none() {
        return Ok(SocketMessage::Ack);
    }

    let envelope: StreamEnvelope =
        serde_json::from_value(value).map_err(|e| malformed(format!("envelope: {}", e)))?;

    if !envelope.stream.contains("@kline_") {
        return Ok(SocketMessage::Ignored(envelope.stream));
    }

    let event: KlineEvent = serde_json::from_value(envelope.data)
        .map_err(|e| malformed(format!("{}: {}", envelope.stream, e)))?;
    let k = &event.kline;

    let candle = Candle::new(
        k.open_time.div_euclid(1000),
        parse_decimal(&k.open, "open")?,
        parse_decimal(&k.high, "high")?,
        parse_decimal(&k.low, "low")?,
        parse_decimal(&k.close, "close")?,
    );

    Ok(SocketMessage::Kline(MarketEvent::NativeCandle {
        symbol: event.symbol.to_uppercase(),
        candle,
        closed: k.closed,
    }))
}

fn kline_row(row: &[Value]) -> Option<Candle> {
    // [openTime, open, high, low, close, volume, closeTime, ...]
    if row.len() < 5 {
        return None;
    }
    let open_time = row[0].as_i64()?;
    let field = |i: usize| row[i].as_str().and_then(|s| Decimal::from_str(s).ok());
    Some(Candle::new(
        open_time.div_euclid(1000),
        field(1)?,
        field(2)?,
        field(3)?,
        field(4)?,
    ))
}

/// Decode an `/api/v3/klines` body. The final row is the still-open kline and is dropped.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>, SourceError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| malformed(format!("klines: {}", e)))?;

    let mut candles = Vec::with_capacity(rows.len());
    let last = rows.len().saturating_sub(1);
    for (index, row) in rows.iter().enumerate() {
        if index == last {
            break;
        }
        match kline_row(row) {
            Some(candle) => candles.push(candle),
            None => warn!("BinanceMarketData: skipping malformed kline row {}", index),
        }
    }
    Ok(candles)
}
