//! Observability configuration parsing from environment variables.
//!
//! This module handles loading the push metrics reporter settings.

use super::VarSource;

/// Observability environment configuration
#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_vars(vars: VarSource<'_>) -> Self {
        Self {
            enabled: vars("OBSERVABILITY_ENABLED")
                .unwrap_or_else(|| "true".to_string())
                .parse::<bool>()
                .unwrap_or(true),
            interval_seconds: vars("OBSERVABILITY_INTERVAL")
                .unwrap_or_else(|| "60".to_string())
                .parse::<u64>()
                .unwrap_or(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_config_defaults() {
        let config = ObservabilityEnvConfig::from_vars(&|_| None);
        assert!(config.enabled);
        assert_eq!(config.interval_seconds, 60);
    }

    #[test]
    fn test_observability_config_tolerates_garbage() {
        let config = ObservabilityEnvConfig::from_vars(&|_| Some("nope".to_string()));
        assert!(config.enabled);
        assert_eq!(config.interval_seconds, 60);
    }
}
