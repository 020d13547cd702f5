//! Output surfaces for engine decisions and closed candles.

pub mod broadcast;
pub mod ndjson;

pub use broadcast::{BroadcastListener, EngineEvent};
pub use ndjson::NdjsonSink;
