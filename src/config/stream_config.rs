//! Streaming connection configuration parsing from environment variables.

use super::{VarSource, parse_var};
use anyhow::Result;
use std::time::Duration;

/// Reconnect and dead-connection settings shared by all adapters
#[derive(Debug, Clone)]
pub struct StreamEnvConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub idle_timeout: Duration,
}

impl Default for StreamEnvConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

impl StreamEnvConfig {
    pub fn from_vars(vars: VarSource<'_>) -> Result<Self> {
        Ok(Self {
            initial_backoff: Duration::from_secs(parse_var(
                vars,
                "RECONNECT_INITIAL_BACKOFF_SECS",
                1u64,
            )?),
            max_backoff: Duration::from_secs(parse_var(vars, "RECONNECT_MAX_BACKOFF_SECS", 5u64)?),
            idle_timeout: Duration::from_secs(parse_var(vars, "STREAM_IDLE_TIMEOUT_SECS", 30u64)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_defaults() {
        let config = StreamEnvConfig::from_vars(&|_| None).unwrap();
        assert_eq!(config.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.max_backoff, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_stream_config_override() {
        let config = StreamEnvConfig::from_vars(&|key| {
            (key == "STREAM_IDLE_TIMEOUT_SECS").then(|| "90".to_string())
        })
        .unwrap();
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
    }
}
