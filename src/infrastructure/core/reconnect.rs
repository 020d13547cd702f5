use super::backoff::ReconnectBackoff;
use crate::domain::errors::SourceError;
use crate::domain::ports::SourceKind;
use crate::domain::trading::types::MarketEvent;
use crate::infrastructure::observability::Metrics;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tracing::{error, info, warn};

/// How a single connection attempt ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The engine dropped its receiver; the stream task must stop.
    SinkClosed,
    /// The connection went away after forwarding `delivered` events.
    Dropped { delivered: usize, cause: SourceError },
}

/// One connect-and-read cycle of a push connection.
#[async_trait]
pub trait StreamSession: Send + 'static {
    /// Component name used as log prefix.
    fn name(&self) -> &'static str;

    fn kind(&self) -> SourceKind;

    /// Connect, forward events into `sink` and return when the connection ends.
    ///
    /// `Err` means the connection could not be established at all.
    async fn run_session(&mut self, sink: &Sender<MarketEvent>) -> Result<SessionEnd>;
}

/// Run `session` forever, reconnecting with `backoff` until the sink closes.
///
/// A non-retryable [`SourceError`] from a connection attempt also ends the loop.
pub async fn run_with_reconnect<S: StreamSession>(
    mut session: S,
    mut backoff: ReconnectBackoff,
    metrics: Option<Metrics>,
    sink: Sender<MarketEvent>,
) {
    let name = session.name();
    loop {
        match session.run_session(&sink).await {
            Ok(SessionEnd::SinkClosed) => {
                info!("{}: engine channel closed, stopping stream", name);
                return;
            }
            Ok(SessionEnd::Dropped { delivered, cause }) => {
                if delivered > 0 {
                    backoff.reset();
                }
                error!(
                    "{}: connection lost after {} events: {}",
                    name, delivered, cause
                );
            }
            Err(e) => {
                if let Some(cause) = e.downcast_ref::<SourceError>()
                    && !cause.is_retryable()
                {
                    error!("{}: giving up: {}", name, cause);
                    return;
                }
                error!("{}: connection attempt failed: {:#}", name, e);
            }
        }

        if sink.is_closed() {
            info!("{}: engine channel closed, not reconnecting", name);
            return;
        }

        let delay = backoff.next_delay();
        if let Some(metrics) = &metrics {
            metrics.inc_reconnects(session.kind());
        }
        warn!(
            "{}: reconnecting in {:?} (attempt {})",
            name,
            delay,
            backoff.attempts()
        );
        tokio::time::sleep(delay).await;
    }
}
