use crate::domain::ports::EngineListener;
use crate::domain::trading::signal::Decision;
use crate::domain::trading::types::Candle;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::error;

#[derive(Serialize)]
struct CandleRecord<'a> {
    event: &'static str,
    symbol: &'a str,
    #[serde(flatten)]
    candle: &'a Candle,
}

/// Writes one JSON object per line for every decision (and closed candle if enabled).
pub struct NdjsonSink {
    writer: Mutex<Box<dyn Write + Send>>,
    emit_candles: bool,
}

impl NdjsonSink {
    pub fn new(writer: Box<dyn Write + Send>, emit_candles: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            emit_candles,
        }
    }

    pub fn stdout(emit_candles: bool) -> Self {
        Self::new(Box::new(io::stdout()), emit_candles)
    }

    fn write_record<T: Serialize>(&self, record: &T) {
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        let result = serde_json::to_writer(&mut *writer, record)
            .map_err(io::Error::from)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush());
        if let Err(e) = result {
            error!("NdjsonSink: failed to write record: {}", e);
        }
    }
}

impl EngineListener for NdjsonSink {
    fn on_candle_closed(&self, symbol: &str, candle: &Candle) {
        if self.emit_candles {
            self.write_record(&CandleRecord {
                event: "CANDLE",
                symbol,
                candle,
            });
        }
    }

    fn on_decision(&self, decision: &Decision) {
        self.write_record(decision);
    }
}
