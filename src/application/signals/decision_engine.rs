use crate::application::market_data::indicators;
use crate::domain::trading::signal::{
    Decision, Direction, IndicatorSnapshot, Pattern, Signal, Sweep, Trend, WaitNotice, WaitReason,
};
use crate::domain::trading::types::Candle;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Output precision of every price field.
pub const PRICE_DECIMALS: u32 = 5;

/// Smallest allowed risk as a fraction of entry, used when the ATR stop collapses.
const MIN_RISK_FRACTION: Decimal = dec!(0.0001);

const TARGET_MULTIPLES: [Decimal; 3] = [dec!(1.5), dec!(2.0), dec!(3.0)];

// Flat strength per confirmation source
const PATTERN_STRENGTH: u8 = 70;
const SWEEP_STRENGTH: u8 = 80;
const COMBINED_STRENGTH: u8 = 90;

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionConfig {
    pub fast_period: usize,
    pub trend_period: usize,
    pub atr_period: usize,
    pub atr_multiplier: Decimal,
    pub sweep_lookback: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            fast_period: 20,
            trend_period: 200,
            atr_period: 14,
            atr_multiplier: dec!(1.5),
            sweep_lookback: 20,
        }
    }
}

impl DecisionConfig {
    /// Closed candles needed before any signal can be produced.
    pub fn min_history(&self) -> usize {
        self.trend_period.max(self.atr_period + 1)
    }
}

/// Stateless trend + confirmation pipeline evaluated once per closed candle.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn snapshot(&self, candles: &[Candle]) -> Option<IndicatorSnapshot> {
        let last = candles.last()?;
        Some(IndicatorSnapshot {
            close: last.close,
            sma_fast: indicators::sma_of_closes(candles, self.config.fast_period),
            sma_trend: indicators::sma_of_closes(candles, self.config.trend_period),
            atr: indicators::atr(candles, self.config.atr_period),
            pattern: indicators::classify_pattern(candles),
            sweep: indicators::detect_sweep(candles, self.config.sweep_lookback),
        })
    }

    /// Evaluate the newest candle of `candles` (oldest first).
    pub fn decide(&self, symbol: &str, candles: &[Candle]) -> Decision {
        let candle_time = candles.last().map(|c| c.open_time).unwrap_or_default();
        let wait = |trend: Trend, reason: WaitReason| {
            Decision::Wait(WaitNotice {
                symbol: symbol.to_string(),
                candle_time,
                trend,
                reason,
            })
        };

        let need = self.config.min_history();
        let insufficient = WaitReason::InsufficientHistory {
            have: candles.len(),
            need,
        };
        if candles.len() < need {
            return wait(Trend::None, insufficient);
        }

        let Some(snapshot) = self.snapshot(candles) else {
            return wait(Trend::None, insufficient);
        };
        let (Some(sma_fast), Some(sma_trend), Some(atr)) =
            (snapshot.sma_fast, snapshot.sma_trend, snapshot.atr)
        else {
            return wait(Trend::None, insufficient);
        };

        let trend = classify_trend(snapshot.close, sma_fast, sma_trend);
        let (direction, wanted_pattern, wanted_sweep) = match trend {
            Trend::Uptrend => (Direction::Buy, Pattern::Bullish, Sweep::BullishSweep),
            Trend::Downtrend => (Direction::Sell, Pattern::Bearish, Sweep::BearishSweep),
            Trend::None => return wait(Trend::None, WaitReason::NoTrend),
        };

        let by_pattern = snapshot.pattern == wanted_pattern;
        let by_sweep = snapshot.sweep == wanted_sweep;
        let (strength_score, confirmation) = match (by_pattern, by_sweep) {
            (true, true) => (COMBINED_STRENGTH, "pattern + sweep"),
            (true, false) => (PATTERN_STRENGTH, "pattern"),
            (false, true) => (SWEEP_STRENGTH, "sweep"),
            (false, false) => return wait(trend, WaitReason::NoConfirmation),
        };

        let levels = RiskLevels::build(
            direction,
            snapshot.close,
            atr * self.config.atr_multiplier,
        );

        let bias = if direction == Direction::Buy {
            "bullish"
        } else {
            "bearish"
        };

        Decision::Signal(Signal {
            symbol: symbol.to_string(),
            candle_time,
            trend,
            direction,
            entry_price: levels.entry,
            stop_loss: levels.stop_loss,
            tp1: levels.targets[0],
            tp2: levels.targets[1],
            tp3: levels.targets[2],
            strength_score,
            reason: format!(
                "{} + {} {} (close {} vs SMA{} {})",
                trend.to_string().to_lowercase(),
                bias,
                confirmation,
                levels.entry,
                self.config.trend_period,
                round_price(sma_trend)
            ),
        })
    }
}

pub fn classify_trend(close: Decimal, sma_fast: Decimal, sma_trend: Decimal) -> Trend {
    if close > sma_trend && sma_fast > sma_trend {
        Trend::Uptrend
    } else if close < sma_trend && sma_fast < sma_trend {
        Trend::Downtrend
    } else {
        Trend::None
    }
}

pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Entry, stop and the three R-multiple targets, already rounded.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskLevels {
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub risk: Decimal,
    pub targets: [Decimal; 3],
}

impl RiskLevels {
    pub fn build(direction: Direction, entry: Decimal, stop_distance: Decimal) -> Self {
        let sign = if direction == Direction::Sell {
            Decimal::NEGATIVE_ONE
        } else {
            Decimal::ONE
        };

        let floor = entry.abs() * MIN_RISK_FRACTION;
        let risk = stop_distance.abs().max(floor);
        let stop_loss = entry - sign * risk;
        let targets = TARGET_MULTIPLES.map(|m| round_price(entry + sign * risk * m));

        Self {
            entry: round_price(entry),
            stop_loss: round_price(stop_loss),
            risk,
            targets,
        }
    }
}
