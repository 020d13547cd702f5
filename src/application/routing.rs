use crate::domain::ports::SourceKind;
use tracing::{info, warn};

/// Quote tokens that mark a crypto pair.
const CRYPTO_QUOTES: [&str; 7] = ["FDUSD", "USDT", "USDC", "BUSD", "BTC", "ETH", "BNB"];

/// ISO codes (fiat and metals) the bank-style source trades.
const FX_CODES: [&str; 14] = [
    "USD", "EUR", "GBP", "JPY", "CHF", "CAD", "AUD", "NZD", "SEK", "NOK", "SGD", "HKD", "XAU",
    "XAG",
];

/// A tracked symbol with its canonical vendor spelling and owning source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedSymbol {
    pub symbol: String,
    pub source: SourceKind,
}

/// Decide the source of one symbol from its name alone.
///
/// `EUR_USD`, `EUR/USD`, `EURUSD` → OANDA as `EUR_USD`;
/// `BTCUSDT`, `btc/usdt`, `ETHBTC` → Binance as `BTCUSDT`.
pub fn route(raw: &str) -> Option<RoutedSymbol> {
    let upper = raw.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }

    if let Some((base, quote)) = upper.split_once(['_', '/', '-']) {
        if is_fx(base) && is_fx(quote) {
            return Some(RoutedSymbol {
                symbol: format!("{}_{}", base, quote),
                source: SourceKind::Oanda,
            });
        }
        // Delimited crypto pairs, e.g. BTC/USDT
        let joined = format!("{}{}", base, quote);
        if is_crypto(&joined) {
            return Some(RoutedSymbol {
                symbol: joined,
                source: SourceKind::Binance,
            });
        }
        // Any other delimited pair is a bank instrument (e.g. SPX500_USD)
        if upper.contains('_') {
            return Some(RoutedSymbol {
                symbol: upper,
                source: SourceKind::Oanda,
            });
        }
        return None;
    }

    if upper.len() == 6 && upper.is_ascii() {
        let (base, quote) = upper.split_at(3);
        if is_fx(base) && is_fx(quote) {
            return Some(RoutedSymbol {
                symbol: format!("{}_{}", base, quote),
                source: SourceKind::Oanda,
            });
        }
    }

    if is_crypto(&upper) {
        return Some(RoutedSymbol {
            symbol: upper,
            source: SourceKind::Binance,
        });
    }

    None
}

fn is_fx(code: &str) -> bool {
    FX_CODES.contains(&code)
}

fn is_crypto(symbol: &str) -> bool {
    symbol.is_ascii()
        && symbol.chars().all(|c| c.is_ascii_alphanumeric())
        && CRYPTO_QUOTES
            .iter()
            .any(|quote| symbol.len() > quote.len() && symbol.ends_with(quote))
}

/// Immutable symbol → source table for one run.
#[derive(Debug, Clone, Default)]
pub struct SymbolRouter {
    routes: Vec<RoutedSymbol>,
}

impl SymbolRouter {
    /// Route every symbol once. Unroutable symbols are logged and skipped; repeats are dropped.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut routes: Vec<RoutedSymbol> = Vec::new();
        for raw in symbols {
            let raw = raw.as_ref();
            match route(raw) {
                Some(routed) if routes.iter().any(|r| r.symbol == routed.symbol) => {}
                Some(routed) => {
                    info!(
                        "SymbolRouter: {} -> {} ({})",
                        raw, routed.symbol, routed.source
                    );
                    routes.push(routed);
                }
                None => warn!("SymbolRouter: no source for symbol '{}', skipping", raw),
            }
        }
        Self { routes }
    }

    pub fn routes(&self) -> &[RoutedSymbol] {
        &self.routes
    }

    pub fn source_of(&self, symbol: &str) -> Option<SourceKind> {
        self.routes
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| r.source)
    }

    pub fn symbols_for(&self, source: SourceKind) -> Vec<String> {
        self.routes
            .iter()
            .filter(|r| r.source == source)
            .map(|r| r.symbol.clone())
            .collect()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.symbol.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_pairs_route_to_oanda() {
        for raw in ["EUR_USD", "eur/usd", "EURUSD", "XAU_USD"] {
            let routed = route(raw).unwrap();
            assert_eq!(routed.source, SourceKind::Oanda, "{}", raw);
        }
        assert_eq!(route("EURUSD").unwrap().symbol, "EUR_USD");
        assert_eq!(route("SPX500_USD").unwrap().source, SourceKind::Oanda);
    }

    #[test]
    fn test_crypto_pairs_route_to_binance() {
        assert_eq!(
            route("btcusdt"),
            Some(RoutedSymbol {
                symbol: "BTCUSDT".to_string(),
                source: SourceKind::Binance
            })
        );
        assert_eq!(route("BTC/USDT").unwrap().symbol, "BTCUSDT");
        assert_eq!(route("ETHBTC").unwrap().source, SourceKind::Binance);
        assert_eq!(route("SOLFDUSD").unwrap().source, SourceKind::Binance);
    }

    #[test]
    fn test_unroutable_symbols() {
        assert_eq!(route(""), None);
        assert_eq!(route("AAPL"), None);
        // A bare quote token is not a pair
        assert_eq!(route("USDT"), None);
    }

    #[test]
    fn test_router_is_fixed_and_deduplicated() {
        let router = SymbolRouter::new(["EUR_USD", "EURUSD", "BTCUSDT", "AAPL", "GBP_USD"]);
        assert_eq!(router.routes().len(), 3);
        assert_eq!(router.source_of("BTCUSDT"), Some(SourceKind::Binance));
        assert_eq!(router.source_of("AAPL"), None);
        assert_eq!(
            router.symbols_for(SourceKind::Oanda),
            vec!["EUR_USD".to_string(), "GBP_USD".to_string()]
        );
    }
}
