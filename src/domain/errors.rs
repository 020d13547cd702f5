use thiserror::Error;

/// Errors raised by exchange adapters while fetching or streaming market data
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Missing credential {name} for {source_name}")]
    MissingCredentials {
        source_name: &'static str,
        name: &'static str,
    },

    #[error("{source_name} returned HTTP {status}: {body}")]
    HttpStatus {
        source_name: &'static str,
        status: u16,
        body: String,
    },

    #[error("Malformed {source_name} payload: {reason}")]
    Malformed {
        source_name: &'static str,
        reason: String,
    },

    #[error("{source_name} stream idle for {idle_secs}s")]
    IdleTimeout {
        source_name: &'static str,
        idle_secs: u64,
    },

    #[error("{source_name} stream closed: {reason}")]
    ConnectionClosed {
        source_name: &'static str,
        reason: String,
    },
}

impl SourceError {
    /// Whether retrying the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::MissingCredentials { .. })
    }
}

/// Errors related to invalid runtime configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("{key} ({value}) must be at least {min_key} ({min})")]
    TooSmall {
        key: &'static str,
        value: usize,
        min_key: &'static str,
        min: usize,
    },
}
