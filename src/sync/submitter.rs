use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::SubmitChange;
use crate::utils::text::{preview, PREVIEW_CHARS};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitStats {
    pub delivered: usize,
    pub dropped: usize,
}

/// Deliver one value; failures are logged and the value is dropped.
pub async fn deliver(submitter: &dyn SubmitChange, text: &str) -> bool {
    match submitter.submit_change(text).await {
        Ok(()) => {
            info!(preview = %preview(text, PREVIEW_CHARS), "Clipboard change sent to server");
            true
        }
        Err(e) => {
            warn!(
                error = %e,
                transient = e.is_transient(),
                preview = %preview(text, PREVIEW_CHARS),
                "Failed to send clipboard change, dropping it"
            );
            false
        }
    }
}

/// Submit changes in the order the detector produced them, at most once each.
pub async fn run_submitter(
    submitter: Arc<dyn SubmitChange>,
    mut changes: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) -> SubmitStats {
    let mut stats = SubmitStats::default();

    loop {
        let text = tokio::select! {
            _ = cancel.cancelled() => break,
            next = changes.recv() => match next {
                Some(text) => text,
                None => break,
            },
        };

        // An in-flight request is abandoned on shutdown.
        let delivered = tokio::select! {
            _ = cancel.cancelled() => break,
            delivered = deliver(submitter.as_ref(), &text) => delivered,
        };

        if delivered {
            stats.delivered += 1;
        } else {
            stats.dropped += 1;
        }
    }

    debug!(delivered = stats.delivered, dropped = stats.dropped, "Submitter stopped");
    stats
}
