pub mod backoff;
pub mod http_client_factory;
pub mod reconnect;

pub use backoff::ReconnectBackoff;
pub use http_client_factory::HttpClientFactory;
pub use reconnect::{SessionEnd, StreamSession, run_with_reconnect};
