use crate::application::routing::RoutedSymbol;
use crate::domain::ports::{MarketDataSource, SourceKind};
use crate::domain::trading::types::{Candle, MarketEvent};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Fetches historical candles for every routed symbol before streaming starts.
///
/// Fetches run concurrently and never touch symbol state: each result is
/// handed back as a [`MarketEvent::Warmup`] for the single writer to merge.
pub struct WarmupService {
    sources: HashMap<SourceKind, Arc<dyn MarketDataSource>>,
    min_candles: usize,
}

impl WarmupService {
    pub fn new(sources: &[Arc<dyn MarketDataSource>], min_candles: usize) -> Self {
        let sources = sources.iter().map(|s| (s.kind(), Arc::clone(s))).collect();
        Self {
            sources,
            min_candles,
        }
    }

    async fn warmup_symbol(&self, routed: &RoutedSymbol) -> Option<Vec<Candle>> {
        let Some(source) = self.sources.get(&routed.source) else {
            warn!(
                "WarmupService: no {} adapter for {}, skipping warm-up",
                routed.source, routed.symbol
            );
            return None;
        };

        match source.warmup(&routed.symbol).await {
            Ok(candles) => {
                if candles.len() < self.min_candles {
                    warn!(
                        "WarmupService: {} returned {} candles (< {}), signals will WAIT until history fills",
                        routed.symbol,
                        candles.len(),
                        self.min_candles
                    );
                } else {
                    info!(
                        "WarmupService: ✓ Fetched {} historical candles for {}",
                        candles.len(),
                        routed.symbol
                    );
                }
                Some(candles)
            }
            Err(e) => {
                warn!(
                    "WarmupService: Failed to warmup {}: {:#}. History will build from live data (degraded mode)",
                    routed.symbol, e
                );
                None
            }
        }
    }

    /// Warm up all symbols in parallel. Failed symbols are left out.
    pub async fn warmup_all(&self, routes: &[RoutedSymbol]) -> Vec<MarketEvent> {
        let results = join_all(routes.iter().map(|r| self.warmup_symbol(r))).await;

        routes
            .iter()
            .zip(results)
            .filter_map(|(routed, candles)| {
                candles.map(|candles| MarketEvent::Warmup {
                    symbol: routed.symbol.clone(),
                    candles,
                })
            })
            .collect()
    }
}
