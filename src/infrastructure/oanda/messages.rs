//! OANDA v20 wire formats: pricing stream lines and instrument candles.

use crate::domain::errors::SourceError;
use crate::domain::trading::types::{Candle, MarketEvent};
use chrono::DateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::warn;

pub(super) const SOURCE_NAME: &str = "OANDA";

/// Reassembles newline-delimited JSON from arbitrary HTTP chunks.
///
/// Chunk boundaries may fall anywhere, including inside a UTF-8 sequence,
/// so bytes are buffered until a full line is available.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and drain every complete, non-blank line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Bytes waiting for their terminating newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// A decoded pricing stream line.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamLine {
    Price(MarketEvent),
    Heartbeat,
    /// Well-formed but carries no usable quote (unknown type, empty book).
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct PricingLine {
    #[serde(rename = "type")]
    kind: String,
    time: Option<String>,
    instrument: Option<String>,
    #[serde(default)]
    bids: Vec<PriceBucket>,
    #[serde(default)]
    asks: Vec<PriceBucket>,
}

#[derive(Debug, Deserialize)]
struct PriceBucket {
    price: String,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    #[serde(default)]
    candles: Vec<InstrumentCandle>,
}

#[derive(Debug, Deserialize)]
struct InstrumentCandle {
    complete: bool,
    time: String,
    mid: Option<CandleMid>,
}

#[derive(Debug, Deserialize)]
struct CandleMid {
    o: String,
    h: String,
    l: String,
    c: String,
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

fn parse_time(raw: &str) -> Result<i64, SourceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.timestamp())
        .map_err(|e| malformed(format!("time '{}': {}", raw, e)))
}

/// Decode one pricing stream line into a midpoint tick.
pub fn parse_stream_line(line: &str) -> Result<StreamLine, SourceError> {
    let msg: PricingLine =
        serde_json::from_str(line).map_err(|e| malformed(format!("{}: {}", e, line)))?;

    match msg.kind.as_str() {
        "HEARTBEAT" => Ok(StreamLine::Heartbeat),
        "PRICE" => {
            let instrument = msg
                .instrument
                .ok_or_else(|| malformed("PRICE without instrument"))?;

            let (Some(bid), Some(ask)) = (msg.bids.first(), msg.asks.first()) else {
                return Ok(StreamLine::Ignored(format!("{} has an empty book", instrument)));
            };

            let time = msg.time.ok_or_else(|| malformed("PRICE without time"))?;
            let timestamp = parse_time(&time)?;
            let bid = parse_decimal(&bid.price, "bid")?;
            let ask = parse_decimal(&ask.price, "ask")?;

            Ok(StreamLine::Price(MarketEvent::Tick {
                symbol: instrument,
                price: (bid + ask) / Decimal::TWO,
                timestamp,
            }))
        }
        other => Ok(StreamLine::Ignored(other.to_string())),
    }
}

/// Decode an `instruments/{i}/candles` body, keeping complete midpoint candles.
pub fn parse_candles(body: &str) -> Result<Vec<Candle>, SourceError> {
    let response: CandlesResponse =
        serde_json::from_str(body).map_err(|e| malformed(format!("candles: {}", e)))?;

    let mut candles = Vec::with_capacity(response.candles.len());
    for candle in response.candles {
        if !candle.complete {
            continue;
        }
        let Some(mid) = candle.mid else {
            continue;
        };
        match to_candle(&candle.time, &mid) {
            Ok(c) => candles.push(c),
            Err(e) => warn!("OandaMarketData: skipping warm-up candle: {}", e),
        }
    }
    Ok(candles)
}

fn to_candle(time: &str, mid: &CandleMid) -> Result<Candle, SourceError> {
    Ok(Candle::new(
        parse_time(time)?,
        parse_decimal(&mid.o, "open")?,
        parse_decimal(&mid.h, "high")?,
        parse_decimal(&mid.l, "low")?,
        parse_decimal(&mid.c, "close")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    const PRICE_LINE: &str = r#"{"type":"PRICE","time":"2024-03-04T10:15:30.123456789Z","bids":[{"price":"1.08500","liquidity":1000000}],"asks":[{"price":"1.08520","liquidity":1000000}],"closeoutBid":"1.08497","closeoutAsk":"1.08523","status":"tradeable","tradeable":true,"instrument":"EUR_USD"}"#;

    #[test]
    fn test_line_buffer_reassembles_split_lines() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(br#"{"type":"HEART"#).is_empty());
        assert!(buffer.pending_len() > 0);

        let lines = buffer.push(b"BEAT\"}\n{\"type\":\"PRICE\"}\n{\"par");
        assert_eq!(lines, vec![r#"{"type":"HEARTBEAT"}"#, r#"{"type":"PRICE"}"#]);
        assert_eq!(buffer.pending_len(), 5);
    }

    #[test]
    fn test_line_buffer_handles_split_utf8_and_blank_lines() {
        let mut buffer = LineBuffer::default();
        let text = "{\"note\":\"é\"}\n\r\n\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(buffer.push(&text[..split]).is_empty());
        let lines = buffer.push(&text[split..]);
        assert_eq!(lines, vec!["{\"note\":\"é\"}"]);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_price_line_becomes_midpoint_tick() {
        let parsed = parse_stream_line(PRICE_LINE).unwrap();
        let expected_ts = Utc.with_ymd_and_hms(2024, 3, 4, 10, 15, 30).unwrap().timestamp();
        assert_eq!(
            parsed,
            StreamLine::Price(MarketEvent::Tick {
                symbol: "EUR_USD".to_string(),
                price: dec!(1.08510),
                timestamp: expected_ts,
            })
        );
    }

    #[test]
    fn test_heartbeat_is_not_an_error() {
        let line = r#"{"type":"HEARTBEAT","time":"2024-03-04T10:15:35.000000000Z"}"#;
        assert_eq!(parse_stream_line(line).unwrap(), StreamLine::Heartbeat);
    }

    #[test]
    fn test_empty_book_is_ignored() {
        let line = r#"{"type":"PRICE","time":"2024-03-04T10:15:30Z","bids":[],"asks":[],"instrument":"EUR_USD","tradeable":false}"#;
        assert!(matches!(parse_stream_line(line).unwrap(), StreamLine::Ignored(_)));
    }

    #[test]
    fn test_malformed_lines_are_errors() {
        assert!(parse_stream_line("{not json").is_err());
        assert!(parse_stream_line(r#"{"type":"PRICE","bids":[{"price":"1"}],"asks":[{"price":"1"}]}"#).is_err());
        let bad_price = PRICE_LINE.replace("1.08500", "abc");
        let err = parse_stream_line(&bad_price).unwrap_err();
        assert!(err.to_string().contains("bid"));
    }

    #[test]
    fn test_parse_candles_keeps_complete_midpoints() {
        let body = r#"{
            "instrument":"EUR_USD","granularity":"M5",
            "candles":[
                {"complete":true,"volume":120,"time":"2024-03-04T10:00:00.000000000Z","mid":{"o":"1.08400","h":"1.08480","l":"1.08390","c":"1.08450"}},
                {"complete":true,"volume":98,"time":"2024-03-04T10:05:00.000000000Z","mid":{"o":"1.08450","h":"1.08520","l":"1.08440","c":"1.08500"}},
                {"complete":false,"volume":12,"time":"2024-03-04T10:10:00.000000000Z","mid":{"o":"1.08500","h":"1.08510","l":"1.08495","c":"1.08505"}}
            ]
        }"#;

        let candles = parse_candles(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].open_time - candles[0].open_time, 300);
        assert_eq!(candles[0].high, dec!(1.08480));
        assert_eq!(candles[1].close, dec!(1.08500));
    }

    #[test]
    fn test_parse_candles_skips_bad_entries() {
        let body = r#"{"candles":[
            {"complete":true,"time":"garbage","mid":{"o":"1","h":"1","l":"1","c":"1"}},
            {"complete":true,"time":"2024-03-04T10:05:00Z"},
            {"complete":true,"time":"2024-03-04T10:10:00Z","mid":{"o":"1.1","h":"1.2","l":"1.0","c":"1.15"}}
        ]}"#;
        let candles = parse_candles(body).unwrap();
        assert_eq!(candles.len(), 1);
        assert!(parse_candles("<html>rate limited</html>").is_err());
    }
}
