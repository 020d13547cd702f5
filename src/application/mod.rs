// Single-writer engine task and warm-up
pub mod agents;

// Core call surface: aggregation + decisions + listeners
pub mod engine;

// Candle aggregation and indicators
pub mod market_data;

pub mod routing;

// Trend / pattern / sweep decisions
pub mod signals;

// Bootstrap
pub mod system;
