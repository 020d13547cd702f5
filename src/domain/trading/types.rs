use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed OHLC candle. `open_time` is the bucket start in Unix seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub open_time: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub close: Decimal,
}

impl Candle {
    pub fn new(open_time: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn upper_wick(&self) -> Decimal {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> Decimal {
        self.open.min(self.close) - self.low
    }
}

/// Where the in-progress candle of a symbol comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleOrigin {
    /// Built locally from ticks.
    Aggregated,
    /// Mirrors a vendor "open" kline. Display only, never persisted.
    Shadow,
}

/// The mutable, not yet closed candle of a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCandle {
    pub bucket: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub origin: CandleOrigin,
    pub tick_count: u32,
}

impl ActiveCandle {
    pub fn from_tick(bucket: i64, price: Decimal) -> Self {
        Self {
            bucket,
            open: price,
            high: price,
            low: price,
            close: price,
            origin: CandleOrigin::Aggregated,
            tick_count: 1,
        }
    }

    pub fn shadow(candle: &Candle) -> Self {
        Self {
            bucket: candle.open_time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            origin: CandleOrigin::Shadow,
            tick_count: 0,
        }
    }

    pub fn update(&mut self, price: Decimal) {
        self.tick_count += 1;
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
    }

    pub fn to_candle(&self) -> Candle {
        Candle {
            open_time: self.bucket,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }
}

/// Normalized input produced by the exchange adapters.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    Tick {
        symbol: String,
        price: Decimal,
        /// Unix seconds
        timestamp: i64,
    },
    NativeCandle {
        symbol: String,
        candle: Candle,
        closed: bool,
    },
    Warmup {
        symbol: String,
        candles: Vec<Candle>,
    },
}

impl MarketEvent {
    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::Tick { symbol, .. }
            | MarketEvent::NativeCandle { symbol, .. }
            | MarketEvent::Warmup { symbol, .. } => symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_candle_anatomy() {
        // Green candle: open 1.1000, close 1.1010, high 1.1015, low 1.0980
        let c = Candle::new(0, dec!(1.1000), dec!(1.1015), dec!(1.0980), dec!(1.1010));
        assert!(c.is_bullish());
        assert!(!c.is_bearish());
        assert_eq!(c.body(), dec!(0.0010));
        assert_eq!(c.upper_wick(), dec!(0.0005));
        assert_eq!(c.lower_wick(), dec!(0.0020));
    }

    #[test]
    fn test_doji_is_neither_green_nor_red() {
        let c = Candle::new(0, dec!(100), dec!(101), dec!(99), dec!(100));
        assert!(!c.is_bullish());
        assert!(!c.is_bearish());
        assert_eq!(c.body(), Decimal::ZERO);
    }

    #[test]
    fn test_active_candle_tracks_extremes() {
        let mut active = ActiveCandle::from_tick(300, dec!(10));
        active.update(dec!(12));
        active.update(dec!(9));
        active.update(dec!(11));

        let candle = active.to_candle();
        assert_eq!(candle.open_time, 300);
        assert_eq!(candle.open, dec!(10));
        assert_eq!(candle.high, dec!(12));
        assert_eq!(candle.low, dec!(9));
        assert_eq!(candle.close, dec!(11));
        assert_eq!(active.tick_count, 4);
    }

    #[test]
    fn test_candle_serializes_prices_as_numbers() {
        let c = Candle::new(600, dec!(1.5), dec!(2), dec!(1), dec!(1.75));
        let json = serde_json::to_value(c).unwrap();
        assert_eq!(json["openTime"], 600);
        assert_eq!(json["close"], 1.75);
    }
}
