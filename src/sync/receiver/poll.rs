use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{apply_and_log, ChannelExit, RemoteApplier, RemoteUpdate, UpdateChannel};
use crate::backend::FetchLatest;
use crate::sync::state::SequenceMarker;

/// Short-interval polling of the server's latest value.
pub struct PollChannel {
    source: Arc<dyn FetchLatest>,
    interval: Duration,
}

impl PollChannel {
    pub fn new(source: Arc<dyn FetchLatest>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// One fetch-and-apply round.
    pub async fn poll_once(&self, applier: &mut RemoteApplier) {
        match self.source.fetch_latest().await {
            Ok(Some(latest)) => {
                let update = RemoteUpdate {
                    marker: Some(SequenceMarker::new(latest.marker)),
                    text: latest.text,
                };
                apply_and_log(applier, update, self.name()).await;
            }
            Ok(None) => debug!("Server has no clipboard value yet"),
            Err(e) => warn!(error = %e, transient = e.is_transient(), "Polling for remote updates failed"),
        }
    }
}

#[async_trait]
impl UpdateChannel for PollChannel {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn run(&mut self, applier: &mut RemoteApplier, cancel: &CancellationToken) -> ChannelExit {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return ChannelExit::Cancelled,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => return ChannelExit::Cancelled,
                _ = self.poll_once(applier) => {}
            }
        }
    }
}
