use tokio::sync::watch;

/// Identifies the most recently applied server-originated update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceMarker(u64);

impl SequenceMarker {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_newer_than(self, other: SequenceMarker) -> bool {
        self.0 > other.0
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for SequenceMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Writer side of LastAppliedRemote, owned by the receiver.
pub type AppliedRemoteTx = watch::Sender<Option<String>>;
/// Reader side of LastAppliedRemote, owned by the detector.
pub type AppliedRemoteRx = watch::Receiver<Option<String>>;

pub fn applied_remote_channel() -> (AppliedRemoteTx, AppliedRemoteRx) {
    watch::channel(None)
}

/// Detector-side echo suppression.
///
/// Suppresses the value most recently published by the receiver until a
/// different local value has been observed.
#[derive(Debug)]
pub struct EchoGuard {
    applied: AppliedRemoteRx,
    suppressed: Option<String>,
}

impl EchoGuard {
    pub fn new(applied: AppliedRemoteRx) -> Self {
        Self {
            applied,
            suppressed: None,
        }
    }

    /// Pick up whatever the receiver published since the last call.
    fn refresh(&mut self) {
        // A dropped receiver means nothing new will be published; keep the current guard.
        if self.applied.has_changed().unwrap_or(false) {
            self.suppressed = self.applied.borrow_and_update().clone();
        }
    }

    pub fn suppresses(&mut self, value: &str) -> bool {
        self.refresh();
        self.suppressed.as_deref() == Some(value)
    }

    /// A different local value was seen; the remote value may be copied again legitimately.
    pub fn release(&mut self) {
        self.suppressed = None;
    }

    pub fn suppressed(&self) -> Option<&str> {
        self.suppressed.as_deref()
    }
}
