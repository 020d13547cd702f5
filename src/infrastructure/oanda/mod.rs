//! OANDA v20 infrastructure - Forex midpoint prices over a chunked HTTP stream.

pub mod market_data;
pub mod messages;

pub use market_data::OandaMarketDataSource;
