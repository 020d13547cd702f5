use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Uptrend,
    Downtrend,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
    None,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::None => write!(f, "NONE"),
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Uptrend => write!(f, "UPTREND"),
            Trend::Downtrend => write!(f, "DOWNTREND"),
            Trend::None => write!(f, "NONE"),
        }
    }
}

/// Candlestick pattern classification of the last two candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pattern {
    Bullish,
    Bearish,
    Neutral,
}

/// Liquidity sweep classification of the current candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sweep {
    BullishSweep,
    BearishSweep,
    None,
}

/// Indicator values recomputed on every closed candle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSnapshot {
    pub close: Decimal,
    pub sma_fast: Option<Decimal>,
    pub sma_trend: Option<Decimal>,
    pub atr: Option<Decimal>,
    pub pattern: Pattern,
    pub sweep: Sweep,
}

/// Actionable trade idea with risk-managed targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub candle_time: i64,
    pub trend: Trend,
    pub direction: Direction,
    #[serde(with = "rust_decimal::serde::float")]
    pub entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub stop_loss: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tp1: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tp2: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tp3: Decimal,
    pub strength_score: u8,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitNotice {
    pub symbol: String,
    pub candle_time: i64,
    pub trend: Trend,
    pub reason: WaitReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum WaitReason {
    InsufficientHistory { have: usize, need: usize },
    NoTrend,
    NoConfirmation,
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitReason::InsufficientHistory { have, need } => {
                write!(f, "insufficient history: {}/{} candles", have, need)
            }
            WaitReason::NoTrend => write!(f, "no trend"),
            WaitReason::NoConfirmation => write!(f, "no confirmation"),
        }
    }
}

impl From<WaitReason> for String {
    fn from(reason: WaitReason) -> Self {
        reason.to_string()
    }
}

impl TryFrom<String> for WaitReason {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "no trend" => Ok(WaitReason::NoTrend),
            "no confirmation" => Ok(WaitReason::NoConfirmation),
            other => {
                let counts = other
                    .strip_prefix("insufficient history: ")
                    .and_then(|rest| rest.strip_suffix(" candles"))
                    .and_then(|rest| rest.split_once('/'))
                    .and_then(|(have, need)| Some((have.parse().ok()?, need.parse().ok()?)));
                match counts {
                    Some((have, need)) => Ok(WaitReason::InsufficientHistory { have, need }),
                    None => Err(format!("unknown wait reason: {}", other)),
                }
            }
        }
    }
}

/// Outcome of one closed-candle evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Signal(Signal),
    Wait(WaitNotice),
}

impl Decision {
    pub fn symbol(&self) -> &str {
        match self {
            Decision::Signal(s) => &s.symbol,
            Decision::Wait(w) => &w.symbol,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Decision::Signal(s) => s.direction,
            Decision::Wait(_) => Direction::None,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            Decision::Signal(_) => "SIGNAL",
            Decision::Wait(_) => "WAIT",
        }
    }

    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Decision::Signal(s) => Some(s),
            Decision::Wait(_) => None,
        }
    }

    pub fn as_wait(&self) -> Option<&WaitNotice> {
        match self {
            Decision::Wait(w) => Some(w),
            Decision::Signal(_) => None,
        }
    }
}
