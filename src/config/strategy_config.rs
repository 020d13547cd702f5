//! Signal pipeline configuration parsing from environment variables.
//!
//! Candle interval, history size, indicator periods and the stop multiplier.

use super::{VarSource, parse_var};
use crate::domain::market::timeframe::Timeframe;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Signal environment configuration
#[derive(Debug, Clone)]
pub struct SignalEnvConfig {
    pub timeframe: Timeframe,
    pub history_capacity: usize,
    pub warmup_candles: usize,

    // Trend filter
    pub fast_sma_period: usize,
    pub trend_sma_period: usize,

    // Stop construction
    pub atr_period: usize,
    pub atr_stop_multiplier: Decimal,

    pub sweep_lookback: usize,

    /// Tick outlier filter as a ratio (0.015 = 1.5%). `None` disables it.
    pub max_tick_deviation: Option<Decimal>,
}

impl Default for SignalEnvConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::FiveMin,
            history_capacity: 300,
            warmup_candles: 300,
            fast_sma_period: 20,
            trend_sma_period: 200,
            atr_period: 14,
            atr_stop_multiplier: dec!(1.5),
            sweep_lookback: 20,
            max_tick_deviation: None,
        }
    }
}

impl SignalEnvConfig {
    pub fn from_vars(vars: VarSource<'_>) -> Result<Self> {
        let timeframe = vars("CANDLE_INTERVAL")
            .unwrap_or_else(|| "5m".to_string())
            .parse::<Timeframe>()
            .context("Failed to parse CANDLE_INTERVAL")?;

        let max_tick_deviation = match vars("MAX_TICK_DEVIATION_PCT") {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<Decimal>()
                    .context("Failed to parse MAX_TICK_DEVIATION_PCT")?,
            ),
            _ => None,
        };

        Ok(Self {
            timeframe,
            history_capacity: parse_var(vars, "HISTORY_CAPACITY", 300)?,
            warmup_candles: parse_var(vars, "WARMUP_CANDLES", 300)?,
            fast_sma_period: parse_var(vars, "FAST_SMA_PERIOD", 20)?,
            trend_sma_period: parse_var(vars, "TREND_SMA_PERIOD", 200)?,
            atr_period: parse_var(vars, "ATR_PERIOD", 14)?,
            atr_stop_multiplier: parse_var(vars, "ATR_STOP_MULTIPLIER", dec!(1.5))?,
            sweep_lookback: parse_var(vars, "SWEEP_LOOKBACK", 20)?,
            max_tick_deviation,
        })
    }
}
