//! Push-based observability for rustsignal
//!
//! This module provides observability through **outbound data only** - no HTTP server,
//! no incoming requests. Counters live in a prometheus registry and are
//! periodically logged as structured JSON.

pub mod metrics;
pub mod reporter;

pub use metrics::{Metrics, MetricsListener};
pub use reporter::MetricsReporter;
