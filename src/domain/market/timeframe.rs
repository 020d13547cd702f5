use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval. Only one is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    FiveMin,
    FifteenMin,
    OneHour,
    FourHour,
    OneDay,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
        }
    }

    /// Returns the duration in seconds
    pub fn to_seconds(&self) -> i64 {
        self.to_minutes() * 60
    }

    /// Converts to Binance API interval string
    pub fn to_binance_string(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
        }
    }

    /// Converts to OANDA API granularity string
    pub fn to_oanda_string(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "M1",
            Timeframe::FiveMin => "M5",
            Timeframe::FifteenMin => "M15",
            Timeframe::OneHour => "H1",
            Timeframe::FourHour => "H4",
            Timeframe::OneDay => "D",
        }
    }
}

/// Start of the bucket containing `timestamp` (Unix seconds).
///
/// Uses euclidean remainder so pre-epoch timestamps still round down.
pub fn bucket_start(timestamp: i64, interval_seconds: i64) -> i64 {
    timestamp - timestamp.rem_euclid(interval_seconds)
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "1min" | "m1" => Ok(Timeframe::OneMin),
            "5m" | "5min" | "m5" => Ok(Timeframe::FiveMin),
            "15m" | "15min" | "m15" => Ok(Timeframe::FifteenMin),
            "1h" | "1hour" | "h1" => Ok(Timeframe::OneHour),
            "4h" | "4hour" | "h4" => Ok(Timeframe::FourHour),
            "1d" | "1day" | "d" => Ok(Timeframe::OneDay),
            _ => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: 1m, 5m, 15m, 1h, 4h, 1d",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_string())
    }
}
