//! Market data source configuration parsing from environment variables.
//!
//! - OANDA (Forex, bearer-authenticated streaming HTTP)
//! - Binance (Crypto, public push socket)

use super::VarSource;
use crate::domain::errors::SourceError;

/// OANDA API configuration
#[derive(Debug, Clone, Default)]
pub struct OandaConfig {
    pub api_base_url: String,
    pub stream_base_url: String,
    pub api_key: String,
    pub account_id: String,
}

impl OandaConfig {
    pub fn from_vars(vars: VarSource<'_>) -> Self {
        Self {
            api_base_url: vars("OANDA_API_BASE_URL")
                .unwrap_or_else(|| "https://api-fxpractice.oanda.com".to_string()),
            stream_base_url: vars("OANDA_STREAM_BASE_URL")
                .unwrap_or_else(|| "https://stream-fxpractice.oanda.com".to_string()),
            api_key: vars("OANDA_API_KEY").unwrap_or_default(),
            account_id: vars("OANDA_ACCOUNT_ID").unwrap_or_default(),
        }
    }

    /// Both credentials are needed for streaming; only the key for warm-up.
    pub fn require_api_key(&self) -> Result<&str, SourceError> {
        if self.api_key.trim().is_empty() {
            return Err(SourceError::MissingCredentials {
                source_name: "OANDA",
                name: "OANDA_API_KEY",
            });
        }
        Ok(&self.api_key)
    }

    pub fn require_account_id(&self) -> Result<&str, SourceError> {
        if self.account_id.trim().is_empty() {
            return Err(SourceError::MissingCredentials {
                source_name: "OANDA",
                name: "OANDA_ACCOUNT_ID",
            });
        }
        Ok(&self.account_id)
    }
}

/// Binance public market data configuration
#[derive(Debug, Clone, Default)]
pub struct BinanceConfig {
    pub base_url: String,
    pub ws_url: String,
}

impl BinanceConfig {
    pub fn from_vars(vars: VarSource<'_>) -> Self {
        Self {
            base_url: vars("BINANCE_BASE_URL")
                .unwrap_or_else(|| "https://api.binance.com".to_string()),
            ws_url: vars("BINANCE_WS_URL")
                .unwrap_or_else(|| "wss://stream.binance.com:9443".to_string()),
        }
    }
}

/// Aggregated source configuration
#[derive(Debug, Clone, Default)]
pub struct BrokerEnvConfig {
    pub binance: BinanceConfig,
    pub oanda: OandaConfig,
}

impl BrokerEnvConfig {
    pub fn from_vars(vars: VarSource<'_>) -> Self {
        Self {
            binance: BinanceConfig::from_vars(vars),
            oanda: OandaConfig::from_vars(vars),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_binance_config_defaults() {
        let config = BinanceConfig::from_vars(&lookup(&[]));
        assert!(config.base_url.contains("binance.com"));
        assert!(config.ws_url.starts_with("wss://"));
    }

    #[test]
    fn test_oanda_config_defaults() {
        let config = OandaConfig::from_vars(&lookup(&[]));
        assert!(config.api_base_url.contains("oanda.com"));
        assert!(config.stream_base_url.contains("stream-fxpractice"));
    }

    #[test]
    fn test_oanda_missing_credentials() {
        let config = OandaConfig::from_vars(&lookup(&[("OANDA_API_KEY", "  ")]));
        let err = config.require_api_key().unwrap_err();
        assert!(err.to_string().contains("OANDA_API_KEY"));
        assert!(config.require_account_id().is_err());

        let config = OandaConfig::from_vars(&lookup(&[
            ("OANDA_API_KEY", "token"),
            ("OANDA_ACCOUNT_ID", "101-004-1234567-001"),
        ]));
        assert_eq!(config.require_api_key().unwrap(), "token");
        assert_eq!(config.require_account_id().unwrap(), "101-004-1234567-001");
    }
}
