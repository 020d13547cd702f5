//! Stateless indicator functions over closed candles.
//!
//! Every function is a pure function of its input slice, so they can be called
//! right after an append without any cached state to keep in sync.

use crate::domain::trading::signal::{Pattern, Sweep};
use crate::domain::trading::types::Candle;
use rust_decimal::Decimal;

/// Arithmetic mean of the last `period` values.
pub fn sma(values: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let sum: Decimal = window.iter().copied().sum();
    Some(sum / Decimal::from(period))
}

/// SMA over candle closes.
pub fn sma_of_closes(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let closes: Vec<Decimal> = candles[candles.len() - period..]
        .iter()
        .map(|c| c.close)
        .collect();
    sma(&closes, period)
}

/// True range of `current` given the previous close.
pub fn true_range(current: &Candle, prev_close: Decimal) -> Decimal {
    let hl = current.high - current.low;
    let hc = (current.high - prev_close).abs();
    let lc = (current.low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Average True Range: mean of the last `period` true ranges.
///
/// Needs `period + 1` candles since every true range looks at the previous close.
pub fn atr(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let window = &candles[candles.len() - (period + 1)..];
    let ranges: Vec<Decimal> = window
        .windows(2)
        .map(|pair| true_range(&pair[1], pair[0].close))
        .collect();
    sma(&ranges, period)
}

fn is_bullish_pin_bar(c: &Candle) -> bool {
    let body = c.body();
    c.lower_wick() > body * Decimal::TWO && c.upper_wick() < body
}

fn is_bearish_pin_bar(c: &Candle) -> bool {
    let body = c.body();
    c.upper_wick() > body * Decimal::TWO && c.lower_wick() < body
}

fn is_bullish_engulfing(prev: &Candle, curr: &Candle) -> bool {
    curr.is_bullish() && prev.is_bearish() && curr.close > prev.open && curr.open < prev.close
}

fn is_bearish_engulfing(prev: &Candle, curr: &Candle) -> bool {
    curr.is_bearish() && prev.is_bullish() && curr.close < prev.open && curr.open > prev.close
}

/// Classify the last two candles as a pin bar or engulfing pattern.
///
/// Bullish readings are checked first and win when both directions match.
pub fn classify_pattern(candles: &[Candle]) -> Pattern {
    let [.., prev, curr] = candles else {
        return Pattern::Neutral;
    };

    if is_bullish_pin_bar(curr) || is_bullish_engulfing(prev, curr) {
        Pattern::Bullish
    } else if is_bearish_pin_bar(curr) || is_bearish_engulfing(prev, curr) {
        Pattern::Bearish
    } else {
        Pattern::Neutral
    }
}

/// Liquidity sweep of the current candle against the preceding `lookback - 1` candles.
pub fn detect_sweep(candles: &[Candle], lookback: usize) -> Sweep {
    if lookback < 2 || candles.len() < lookback {
        return Sweep::None;
    }

    let Some((curr, prior)) = candles[candles.len() - lookback..].split_last() else {
        return Sweep::None;
    };

    let prior_high = prior.iter().map(|c| c.high).max();
    let prior_low = prior.iter().map(|c| c.low).min();

    if let Some(high) = prior_high
        && curr.high > high
        && curr.close < high
    {
        return Sweep::BearishSweep;
    }

    if let Some(low) = prior_low
        && curr.low < low
        && curr.close > low
    {
        return Sweep::BullishSweep;
    }

    Sweep::None
}
