//! Remote update receiver: applies server-originated values to the local clipboard.
//!
//! Delivery strategies implement [`UpdateChannel`]; all of them funnel into a
//! single [`RemoteApplier`], which owns RemoteSequenceMarker and is the only
//! writer of LastAppliedRemote.

pub mod frames;
pub mod poll;
pub mod push;

pub use poll::PollChannel;
pub use push::PushChannel;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{AppliedRemoteTx, SequenceMarker};
use crate::clipboard::{ClipboardAccess, ClipboardError};
use crate::utils::text::{is_blank, preview, PREVIEW_CHARS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUpdate {
    /// Server-assigned marker; `None` lets the applier advance its own counter.
    pub marker: Option<SequenceMarker>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Written to the clipboard.
    Applied(SequenceMarker),
    /// The clipboard already held the value; nothing written.
    AlreadyPresent(SequenceMarker),
    /// Marker not newer than the last applied one.
    Stale,
    /// Empty or whitespace-only value; marker consumed, clipboard untouched.
    Blank(SequenceMarker),
}

pub struct RemoteApplier {
    clipboard: Arc<dyn ClipboardAccess>,
    applied: AppliedRemoteTx,
    /// Last server-assigned marker applied; only marked updates are ordered against it.
    marker: SequenceMarker,
    /// Count of unmarked updates, kept apart from server markers.
    local: SequenceMarker,
}

impl RemoteApplier {
    pub fn new(clipboard: Arc<dyn ClipboardAccess>, applied: AppliedRemoteTx) -> Self {
        Self {
            clipboard,
            applied,
            marker: SequenceMarker::default(),
            local: SequenceMarker::default(),
        }
    }

    pub fn marker(&self) -> SequenceMarker {
        self.marker
    }

    pub fn local_marker(&self) -> SequenceMarker {
        self.local
    }

    pub fn last_applied(&self) -> Option<String> {
        self.applied.borrow().clone()
    }

    fn commit(&mut self, marker: SequenceMarker, from_server: bool) {
        if from_server {
            self.marker = marker;
        } else {
            self.local = marker;
        }
    }

    pub async fn apply(&mut self, update: RemoteUpdate) -> Result<ApplyOutcome, ClipboardError> {
        let from_server = update.marker.is_some();
        let marker = match update.marker {
            Some(marker) if !marker.is_newer_than(self.marker) => return Ok(ApplyOutcome::Stale),
            Some(marker) => marker,
            None => self.local.next(),
        };

        if is_blank(&update.text) {
            self.commit(marker, from_server);
            return Ok(ApplyOutcome::Blank(marker));
        }

        // Publish before writing so the detector never sees the value unannounced.
        let previous = self.applied.send_replace(Some(update.text.clone()));

        let clipboard = Arc::clone(&self.clipboard);
        let text = update.text;
        let written = tokio::task::spawn_blocking(move || -> Result<bool, ClipboardError> {
            if clipboard.read_text().is_ok_and(|current| current == text) {
                return Ok(false);
            }
            clipboard.write_text(&text)?;
            Ok(true)
        })
        .await
        .map_err(|e| ClipboardError::Write(e.to_string()))
        .and_then(|result| result);

        match written {
            Ok(true) => {
                self.commit(marker, from_server);
                Ok(ApplyOutcome::Applied(marker))
            }
            Ok(false) => {
                self.commit(marker, from_server);
                Ok(ApplyOutcome::AlreadyPresent(marker))
            }
            Err(e) => {
                self.applied.send_replace(previous);
                Err(e)
            }
        }
    }

    /// Forget LastAppliedRemote after a remote delete/clear.
    ///
    /// With `Some(text)` only a matching value is forgotten. Returns whether anything changed.
    pub fn release(&mut self, text: Option<&str>) -> bool {
        let matches = {
            let current = self.applied.borrow();
            match text {
                Some(text) => current.as_deref() == Some(text),
                None => current.is_some(),
            }
        };
        if matches {
            self.applied.send_replace(None);
        }
        matches
    }
}

/// Apply an update and log the outcome; errors never propagate past here.
pub async fn apply_and_log(applier: &mut RemoteApplier, update: RemoteUpdate, source: &'static str) {
    let text_preview = preview(&update.text, PREVIEW_CHARS);
    match applier.apply(update).await {
        Ok(ApplyOutcome::Applied(marker)) => {
            info!(source, marker = %marker, preview = %text_preview, "Applied remote clipboard value");
        }
        Ok(ApplyOutcome::AlreadyPresent(marker)) => {
            debug!(source, marker = %marker, "Remote value already on clipboard");
        }
        Ok(ApplyOutcome::Stale) => {
            debug!(source, current = %applier.marker(), "Ignoring stale remote update");
        }
        Ok(ApplyOutcome::Blank(marker)) => {
            debug!(source, marker = %marker, "Ignoring blank remote value");
        }
        Err(e) => {
            warn!(source, error = %e, "Failed to apply remote clipboard value");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelExit {
    Cancelled,
    /// The strategy cannot continue; the next one in line takes over.
    GaveUp,
}

/// A way of receiving server-originated clipboard values.
#[async_trait]
pub trait UpdateChannel: Send {
    fn name(&self) -> &'static str;

    async fn run(&mut self, applier: &mut RemoteApplier, cancel: &CancellationToken) -> ChannelExit;
}

/// Run channels in order of preference; each one takes over when the previous gives up.
pub async fn run_receiver(
    channels: Vec<Box<dyn UpdateChannel>>,
    mut applier: RemoteApplier,
    cancel: CancellationToken,
) {
    for mut channel in channels {
        info!(channel = channel.name(), "Remote update receiver started");
        match channel.run(&mut applier, &cancel).await {
            ChannelExit::Cancelled => break,
            ChannelExit::GaveUp => {
                warn!(channel = channel.name(), "Remote update channel gave up");
            }
        }
    }
    info!(marker = %applier.marker(), "Remote update receiver stopped");
}
