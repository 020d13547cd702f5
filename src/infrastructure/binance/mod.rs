pub mod market_data;
pub mod messages;
pub mod websocket;

pub use market_data::BinanceMarketDataSource;
