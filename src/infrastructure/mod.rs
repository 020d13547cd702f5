pub mod binance;
pub mod core;
pub mod mock;
pub mod oanda;
pub mod observability;
pub mod output;
