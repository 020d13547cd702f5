use anyhow::{Context, Result};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;
use url::Url;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Client for one-shot REST calls (warm-up), with retry middleware
    pub fn create_client() -> ClientWithMiddleware {
        // Retry policy:
        // - Exponential backoff
        // - Max 3 retries
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }

    /// Client for long-lived streaming responses.
    ///
    /// No total request timeout (the body never ends); dead connections are
    /// caught by the caller's idle timeout instead. No retry middleware either,
    /// reconnects are owned by the stream loop.
    pub fn create_streaming_client() -> Client {
        Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new())
    }
}

/// Build a URL with encoded query parameters.
///
/// reqwest-middleware does not expose `.query()`, so the query string is part
/// of the URL handed to the request builder.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> Result<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        let url = Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
        return Ok(url.to_string());
    }

    let url = Url::parse_with_params(
        base_url,
        params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())),
    )
    .with_context(|| format!("Invalid base URL: {}", base_url))?;
    Ok(url.to_string())
}
