//! The synchronization loop.
//!
//! Three cooperating tasks share one cancellation token:
//!
//! - the **detector** polls the local clipboard and emits genuine local changes,
//! - the **submitter** delivers those changes to the backend in order,
//! - the **receiver** applies server-originated values to the clipboard.
//!
//! The receiver publishes every value it applies through a watch channel
//! before writing it, and the detector consults that value so a remote
//! update is never sent back to the server.

pub mod backoff;
pub mod detector;
pub mod receiver;
pub mod state;
pub mod submitter;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{BackendClient, FetchLatest, SubmitChange};
use crate::clipboard::ClipboardAccess;
use crate::config::{Config, ReceiverMode, SyncSettings};
use backoff::ReconnectPolicy;
use detector::{read_clipboard, run_detector, ChangeDetector};
use receiver::{run_receiver, PollChannel, PushChannel, RemoteApplier, UpdateChannel};
use state::{applied_remote_channel, EchoGuard};
use submitter::{run_submitter, SubmitStats};

pub struct SyncLoop {
    clipboard: Arc<dyn ClipboardAccess>,
    submitter: Arc<dyn SubmitChange>,
    fetcher: Arc<dyn FetchLatest>,
    push: Option<PushChannel>,
    settings: SyncSettings,
}

impl SyncLoop {
    /// A polling-only loop; add a push channel with [`SyncLoop::with_push`].
    pub fn new(
        clipboard: Arc<dyn ClipboardAccess>,
        submitter: Arc<dyn SubmitChange>,
        fetcher: Arc<dyn FetchLatest>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            clipboard,
            submitter,
            fetcher,
            push: None,
            settings,
        }
    }

    pub fn with_push(mut self, push: PushChannel) -> Self {
        self.push = Some(push);
        self
    }

    pub fn from_config(
        config: &Config,
        clipboard: Arc<dyn ClipboardAccess>,
        client: Arc<BackendClient>,
        mode: ReceiverMode,
    ) -> Result<Self> {
        let sync_loop = Self::new(clipboard, client.clone(), client.clone(), config.sync.clone());
        if mode == ReceiverMode::Poll {
            return Ok(sync_loop);
        }

        let push = PushChannel::new(
            config.server.push_base_url()?,
            &config.server.username,
            &config.server.token,
            client.client_id(),
            ReconnectPolicy::from(&config.reconnect),
            config.server.request_timeout(),
        )?;
        Ok(sync_loop.with_push(push))
    }

    pub fn receiver_mode(&self) -> ReceiverMode {
        if self.push.is_some() {
            ReceiverMode::Push
        } else {
            ReceiverMode::Poll
        }
    }

    /// Run until `cancel` fires. Returns what the submitter delivered.
    pub async fn run(self, cancel: CancellationToken) -> Result<SubmitStats> {
        let (applied_tx, applied_rx) = applied_remote_channel();
        let guard = EchoGuard::new(applied_rx);

        let detector = if self.settings.submit_initial {
            ChangeDetector::new(guard)
        } else {
            match read_clipboard(&self.clipboard).await {
                Ok(initial) => ChangeDetector::primed(guard, initial),
                Err(e) => {
                    warn!(error = %e, "Could not read initial clipboard value");
                    ChangeDetector::new(guard)
                }
            }
        };

        let mut channels: Vec<Box<dyn UpdateChannel>> = Vec::new();
        if let Some(push) = self.push {
            channels.push(Box::new(push));
        }
        channels.push(Box::new(PollChannel::new(self.fetcher, self.settings.poll_interval())));

        let applier = RemoteApplier::new(Arc::clone(&self.clipboard), applied_tx);
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();

        info!(
            receiver = channels[0].name(),
            submit_initial = self.settings.submit_initial,
            "Sync loop starting"
        );

        let detector_task = tokio::spawn(run_detector(
            self.clipboard,
            detector,
            changes_tx,
            self.settings.detect_interval(),
            cancel.clone(),
        ));
        let submitter_task = tokio::spawn(run_submitter(self.submitter, changes_rx, cancel.clone()));
        let receiver_task = tokio::spawn(run_receiver(channels, applier, cancel.clone()));

        let (detected, submitted, received) = tokio::join!(detector_task, submitter_task, receiver_task);
        detected.context("Clipboard detector task failed")?;
        received.context("Remote update receiver task failed")?;
        let stats = submitted.context("Submitter task failed")?;

        info!(delivered = stats.delivered, dropped = stats.dropped, "Sync loop stopped");
        Ok(stats)
    }
}
