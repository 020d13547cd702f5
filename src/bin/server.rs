//! rustsignal Server - Headless signal engine
//!
//! Streams OANDA and Binance market data, aggregates candles and writes one
//! NDJSON decision record per closed candle to stdout. Logs and the periodic
//! metrics snapshot go to stderr.
//!
//! # Usage
//! ```sh
//! SYMBOLS=EUR_USD,BTCUSDT cargo run --bin server -- --interval 5m --emit-candles
//! ```
//!
//! # Environment Variables
//! - `SYMBOLS` - Comma-separated symbols (default: EUR_USD,BTCUSDT)
//! - `CANDLE_INTERVAL` - Candle timeframe (default: 5m)
//! - `OANDA_API_KEY` / `OANDA_ACCOUNT_ID` - Required for forex symbols
//! - `OBSERVABILITY_ENABLED` - Enable metrics reporting (default: true)

use anyhow::{Context, Result};
use clap::Parser;
use rustsignal::application::system::Application;
use rustsignal::config::{Config, parse_symbols};
use rustsignal::domain::market::timeframe::Timeframe;
use rustsignal::domain::ports::EngineListener;
use rustsignal::infrastructure::output::NdjsonSink;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless trading signal engine", long_about = None)]
struct Cli {
    /// Comma-separated symbols, overrides SYMBOLS
    #[arg(short, long)]
    symbols: Option<String>,

    /// Candle interval (1m, 5m, 15m, 1h, 4h, 1d), overrides CANDLE_INTERVAL
    #[arg(short, long)]
    interval: Option<Timeframe>,

    /// Also write closed-candle records
    #[arg(long)]
    emit_candles: bool,
}

fn apply_overrides(mut config: Config, cli: &Cli) -> Result<Config> {
    if let Some(symbols) = &cli.symbols {
        config.symbols = parse_symbols(symbols);
    }
    if let Some(interval) = cli.interval {
        config.signal.timeframe = interval;
    }
    config.emit_candles |= cli.emit_candles;
    config.validate().context("Invalid command line overrides")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // stdout carries the record stream, so logs go to stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    info!("rustsignal Server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = apply_overrides(Config::from_env()?, &cli)?;
    info!(
        "Configuration loaded: Interval={}s, Capacity={}, Symbols={:?}",
        config.interval_seconds(),
        config.signal.history_capacity,
        config.symbols
    );

    let sink: Arc<dyn EngineListener> = Arc::new(NdjsonSink::stdout(config.emit_candles));
    let app = Application::build(config)?;
    let handle = app.start(vec![sink]).await?;
    info!(
        "Server running with {} streams. Press Ctrl+C to shutdown.",
        handle.stream_count()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting...");
    handle.shutdown().await?;

    Ok(())
}
