//! Configuration module for rustsignal.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Sources, Signal pipeline, Streaming and Observability.

mod broker_config;
mod observability_config;
mod strategy_config;
mod stream_config;

pub use broker_config::{BinanceConfig, BrokerEnvConfig, OandaConfig};
pub use observability_config::ObservabilityEnvConfig;
pub use strategy_config::SignalEnvConfig;
pub use stream_config::StreamEnvConfig;

use crate::application::signals::decision_engine::DecisionConfig;
use crate::domain::errors::ConfigError;
use crate::domain::market::timeframe::Timeframe;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Variable lookup used by every sub-config (`std::env` in production).
pub type VarSource<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn parse_var<T>(vars: VarSource<'_>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Failed to parse {}", key)),
        _ => Ok(default),
    }
}

const DEFAULT_SYMBOLS: &str = "EUR_USD,BTCUSDT";

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<String>,
    pub emit_candles: bool,
    pub signal: SignalEnvConfig,
    pub stream: StreamEnvConfig,
    pub oanda: OandaConfig,
    pub binance: BinanceConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: parse_symbols(DEFAULT_SYMBOLS),
            emit_candles: false,
            signal: SignalEnvConfig::default(),
            stream: StreamEnvConfig::default(),
            oanda: OandaConfig::from_vars(&|_| None),
            binance: BinanceConfig::from_vars(&|_| None),
            observability: ObservabilityEnvConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&|key| env::var(key).ok())
    }

    /// Load and validate configuration from an arbitrary variable source.
    pub fn from_vars(vars: VarSource<'_>) -> Result<Self> {
        let symbols =
            parse_symbols(&vars("SYMBOLS").unwrap_or_else(|| DEFAULT_SYMBOLS.to_string()));
        let emit_candles = vars("EMIT_CANDLES")
            .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
            .unwrap_or(false);

        let broker = BrokerEnvConfig::from_vars(vars);
        let signal = SignalEnvConfig::from_vars(vars).context("Failed to load signal config")?;
        let stream = StreamEnvConfig::from_vars(vars).context("Failed to load stream config")?;
        let observability = ObservabilityEnvConfig::from_vars(vars);

        let config = Self {
            symbols,
            emit_candles,
            signal,
            stream,
            oanda: broker.oanda,
            binance: broker.binance,
            observability,
        };
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.signal;
        for (key, value) in [
            ("FAST_SMA_PERIOD", s.fast_sma_period),
            ("TREND_SMA_PERIOD", s.trend_sma_period),
            ("ATR_PERIOD", s.atr_period),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if s.sweep_lookback < 2 {
            return Err(ConfigError::InvalidValue {
                key: "SWEEP_LOOKBACK",
                reason: format!("{} must cover at least 2 candles", s.sweep_lookback),
            });
        }

        if s.fast_sma_period >= s.trend_sma_period {
            return Err(ConfigError::InvalidValue {
                key: "FAST_SMA_PERIOD",
                reason: format!(
                    "{} must be below TREND_SMA_PERIOD ({})",
                    s.fast_sma_period, s.trend_sma_period
                ),
            });
        }

        let min_history = self.decision_config().min_history();
        if s.history_capacity < min_history {
            return Err(ConfigError::TooSmall {
                key: "HISTORY_CAPACITY",
                value: s.history_capacity,
                min_key: "TREND_SMA_PERIOD",
                min: min_history,
            });
        }

        if s.atr_stop_multiplier <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                key: "ATR_STOP_MULTIPLIER",
                reason: format!("{} must be positive", s.atr_stop_multiplier),
            });
        }

        if s.max_tick_deviation.is_some_and(|d| d <= Decimal::ZERO) {
            return Err(ConfigError::InvalidValue {
                key: "MAX_TICK_DEVIATION_PCT",
                reason: "must be positive when set".to_string(),
            });
        }

        if self.stream.idle_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "STREAM_IDLE_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.symbols.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "SYMBOLS",
                reason: "at least one symbol is required".to_string(),
            });
        }

        Ok(())
    }

    pub fn timeframe(&self) -> Timeframe {
        self.signal.timeframe
    }

    pub fn interval_seconds(&self) -> i64 {
        self.signal.timeframe.to_seconds()
    }

    pub fn decision_config(&self) -> DecisionConfig {
        DecisionConfig {
            fast_period: self.signal.fast_sma_period,
            trend_period: self.signal.trend_sma_period,
            atr_period: self.signal.atr_period,
            atr_multiplier: self.signal.atr_stop_multiplier,
            sweep_lookback: self.signal.sweep_lookback,
        }
    }

    /// Candles to request per warm-up fetch, never fewer than the decision floor.
    pub fn warmup_limit(&self) -> usize {
        self.signal
            .warmup_candles
            .max(self.decision_config().min_history())
    }
}

pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
