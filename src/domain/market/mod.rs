// Market data domain
pub mod history;
pub mod timeframe;
