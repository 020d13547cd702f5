use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rustsignal::application::engine::SignalEngine;
use rustsignal::application::market_data::candle_aggregator::{CandleAggregator, TickOutcome};
use rustsignal::application::signals::decision_engine::DecisionEngine;
use rustsignal::domain::trading::signal::{Decision, Direction, Trend, WaitReason};
use rustsignal::domain::trading::types::Candle;
use rustsignal::infrastructure::output::{BroadcastListener, EngineEvent};
use std::sync::Arc;

const INTERVAL: i64 = 300;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

fn engine() -> SignalEngine {
    SignalEngine::new(CandleAggregator::new(INTERVAL, 300), DecisionEngine::default())
}

/// `count` candles with a steadily rising close, one per bucket from t=0.
fn rising_history(count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let close = dec!(1.0) + Decimal::from(i) * dec!(0.001);
            let open = close - dec!(0.0005);
            Candle::new(
                i as i64 * INTERVAL,
                open,
                close + dec!(0.0002),
                open - dec!(0.0002),
                close,
            )
        })
        .collect()
}

fn feed_bucket(
    engine: &mut SignalEngine,
    symbol: &str,
    bucket: i64,
    prices: &[Decimal],
) -> Vec<Decision> {
    prices
        .iter()
        .enumerate()
        .filter_map(|(i, price)| engine.feed_tick(symbol, *price, bucket + 1 + i as i64).decision)
        .collect()
}

/// Live ticks forming a bearish candle followed by a bullish engulfing one.
/// Returns the decision emitted when the engulfing candle closes.
fn trade_bullish_engulfing(engine: &mut SignalEngine, symbol: &str, start: i64) -> Decision {
    // Bearish: O 1.2010 H 1.2012 L 1.1990 C 1.1995
    feed_bucket(engine, symbol, start, &[dec!(1.2010), dec!(1.2012), dec!(1.1990), dec!(1.1995)]);
    // Bullish engulfing: O 1.1993 H 1.2030 L 1.1990 C 1.2025
    feed_bucket(
        engine,
        symbol,
        start + INTERVAL,
        &[dec!(1.1993), dec!(1.1990), dec!(1.2030), dec!(1.2025)],
    );
    // First tick of the next bucket closes the engulfing candle
    engine
        .feed_tick(symbol, dec!(1.2026), start + 2 * INTERVAL + 1)
        .decision
        .expect("closing the engulfing candle must produce a decision")
}

#[test]
fn test_uptrend_with_bullish_engulfing_emits_buy() {
    init_logging();
    let mut engine = engine();
    let broadcast = Arc::new(BroadcastListener::new(64));
    let mut events = broadcast.subscribe();
    engine.subscribe(broadcast.clone());

    let history = rising_history(200);
    assert_eq!(engine.load_warmup("EUR_USD", &history), 200);

    let decision = trade_bullish_engulfing(&mut engine, "EUR_USD", 200 * INTERVAL);
    let signal = decision.as_signal().expect("expected a BUY signal");

    assert_eq!(signal.direction, Direction::Buy);
    assert_eq!(signal.trend, Trend::Uptrend);
    assert_eq!(signal.candle_time, 201 * INTERVAL);
    assert_eq!(signal.entry_price, dec!(1.2025));
    assert!(signal.stop_loss < signal.entry_price);
    assert!(signal.entry_price < signal.tp1);
    assert!(signal.tp1 < signal.tp2 && signal.tp2 < signal.tp3);
    assert!(signal.strength_score >= 70);

    // Two closes, each followed by its decision
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.len(), 4);
    assert!(matches!(
        &seen[2],
        EngineEvent::CandleClosed { candle, .. } if candle.open_time == 201 * INTERVAL
    ));
    assert_eq!(seen[3], EngineEvent::Decision(decision.clone()));
}

#[test]
fn test_short_history_always_waits() {
    init_logging();
    let mut engine = engine();
    engine.load_warmup("EUR_USD", &rising_history(150));

    let decision = trade_bullish_engulfing(&mut engine, "EUR_USD", 150 * INTERVAL);
    let wait = decision.as_wait().expect("expected WAIT");

    assert_eq!(wait.trend, Trend::None);
    assert_eq!(
        wait.reason,
        WaitReason::InsufficientHistory {
            have: 152,
            need: 200
        }
    );
    assert_eq!(decision.direction(), Direction::None);
}

#[test]
fn test_late_tick_leaves_state_unchanged() {
    let mut engine = engine();
    engine.load_warmup("BTCUSDT", &rising_history(10));

    feed_bucket(&mut engine, "BTCUSDT", 10 * INTERVAL, &[dec!(1.02), dec!(1.03)]);
    feed_bucket(&mut engine, "BTCUSDT", 11 * INTERVAL, &[dec!(1.04)]);

    let active_before = engine.active("BTCUSDT").cloned().unwrap();
    let history_before = engine.history("BTCUSDT").unwrap().snapshot().to_vec();

    // Bucket 10 is already closed, bucket 5 is deep history
    for ts in [10 * INTERVAL + 200, 5 * INTERVAL] {
        let report = engine.feed_tick("BTCUSDT", dec!(9.99), ts);
        assert_eq!(report.outcome, TickOutcome::Late);
        assert!(report.decision.is_none());
    }

    assert_eq!(engine.active("BTCUSDT"), Some(&active_before));
    assert_eq!(engine.history("BTCUSDT").unwrap().snapshot(), history_before.as_slice());
}

#[test]
fn test_native_close_matches_aggregated_ticks() {
    let prices = [dec!(67000.5), dec!(67120.0), dec!(66950.25), dec!(67080.75)];
    let bucket = 3 * INTERVAL;

    let mut aggregated = engine();
    feed_bucket(&mut aggregated, "BTCUSDT", bucket, &prices);
    let report = aggregated.feed_tick("BTCUSDT", dec!(67090), bucket + INTERVAL);
    assert!(matches!(report.outcome, TickOutcome::Closed(_)));

    let mut native = engine();
    // An open update first, as the socket delivers it, then the final kline
    native.feed_native_candle(
        "BTCUSDT",
        Candle::new(bucket, dec!(67000.5), dec!(67120.0), dec!(67000.5), dec!(67110)),
        false,
    );
    native.feed_native_candle(
        "BTCUSDT",
        Candle::new(bucket, dec!(67000.5), dec!(67120.0), dec!(66950.25), dec!(67080.75)),
        true,
    );

    assert_eq!(
        aggregated.history("BTCUSDT").unwrap().snapshot(),
        native.history("BTCUSDT").unwrap().snapshot()
    );
    assert!(native.active("BTCUSDT").is_none());
}
