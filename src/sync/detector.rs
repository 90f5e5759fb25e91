use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::EchoGuard;
use crate::clipboard::{ClipboardAccess, ClipboardError};
use crate::utils::text::{is_blank, preview, PREVIEW_CHARS};

/// Result of comparing one clipboard read against what the detector knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Same value as the last one acted on.
    Unchanged,
    /// Empty or whitespace-only clipboard.
    Blank,
    /// The value the receiver just applied.
    Echo,
    /// A genuine local change to submit.
    Changed(String),
}

/// Decides whether a clipboard read is a genuine local change.
#[derive(Debug)]
pub struct ChangeDetector {
    last_seen: Option<String>,
    guard: EchoGuard,
}

impl ChangeDetector {
    pub fn new(guard: EchoGuard) -> Self {
        Self {
            last_seen: None,
            guard,
        }
    }

    /// Start with `initial` already considered seen, so it is never submitted.
    pub fn primed(guard: EchoGuard, initial: String) -> Self {
        Self {
            last_seen: Some(initial),
            guard,
        }
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    pub fn observe(&mut self, current: String) -> Observation {
        if self.last_seen.as_deref() == Some(current.as_str()) {
            return Observation::Unchanged;
        }
        if is_blank(&current) {
            return Observation::Blank;
        }
        if self.guard.suppresses(&current) {
            self.last_seen = Some(current);
            return Observation::Echo;
        }

        self.guard.release();
        self.last_seen = Some(current.clone());
        Observation::Changed(current)
    }
}

pub(crate) async fn read_clipboard(clipboard: &Arc<dyn ClipboardAccess>) -> Result<String, ClipboardError> {
    let reader = Arc::clone(clipboard);
    tokio::task::spawn_blocking(move || reader.read_text())
        .await
        .map_err(|e| ClipboardError::Read(e.to_string()))?
}

/// Poll the clipboard every `interval` and forward genuine local changes to `changes`.
///
/// Returns when cancelled or when the submitter side of `changes` is gone.
pub async fn run_detector(
    clipboard: Arc<dyn ClipboardAccess>,
    mut detector: ChangeDetector,
    changes: mpsc::UnboundedSender<String>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_ms = interval.as_millis() as u64, "Clipboard detector started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let current = match read_clipboard(&clipboard).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Clipboard read failed, skipping poll");
                continue;
            }
        };

        match detector.observe(current) {
            Observation::Changed(text) => {
                info!(preview = %preview(&text, PREVIEW_CHARS), "Local clipboard change detected");
                if changes.send(text).is_err() {
                    debug!("Submitter is gone, stopping detector");
                    break;
                }
            }
            Observation::Echo => {
                debug!("Clipboard holds the remotely applied value, not resubmitting");
            }
            Observation::Unchanged | Observation::Blank => {}
        }
    }

    info!("Clipboard detector stopped");
}
