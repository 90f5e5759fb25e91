mod memory;

pub use memory::MemoryClipboard;

use arboard::Clipboard;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How long one-shot commands keep serving a value they put on the clipboard.
pub const HOLD_AFTER_COPY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("Failed to access system clipboard: {0}")]
    Unavailable(String),
    #[error("Failed to read clipboard: {0}")]
    Read(String),
    #[error("Failed to write clipboard: {0}")]
    Write(String),
}

/// Text-only view of a clipboard slot.
///
/// An empty clipboard, or one holding non-text content, reads as `""`.
pub trait ClipboardAccess: Send + Sync {
    fn read_text(&self) -> Result<String, ClipboardError>;
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Write `text` and keep it available until `deadline` or until another
    /// application takes the clipboard. Blocks on platforms where the value
    /// is served by the writing process.
    fn write_and_hold(&self, text: &str, deadline: Instant) -> Result<(), ClipboardError> {
        let _ = deadline;
        self.write_text(text)
    }
}

/// Copy for a process that is about to exit: the value outlives the process
/// for up to `hold` (or until something else is copied).
pub fn copy_and_hold(clipboard: &dyn ClipboardAccess, text: &str, hold: Duration) -> Result<(), ClipboardError> {
    clipboard.write_and_hold(text, Instant::now() + hold)
}

/// The OS clipboard.
///
/// Keeps one `arboard::Clipboard` alive for the lifetime of the process. On
/// Linux, clipboard contents are served by the owning process, so a value
/// written here stays available only while this handle is alive.
pub struct SystemClipboard {
    inner: Mutex<Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard = Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(clipboard),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Clipboard>, ClipboardError> {
        self.inner
            .lock()
            .map_err(|_| ClipboardError::Unavailable("clipboard lock poisoned".to_string()))
    }
}

impl ClipboardAccess for SystemClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        let mut clipboard = self.lock()?;

        match clipboard.get_text() {
            Ok(text) => Ok(text),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        }
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.lock()?
            .set_text(text)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }

    #[cfg(target_os = "linux")]
    fn write_and_hold(&self, text: &str, deadline: Instant) -> Result<(), ClipboardError> {
        use arboard::SetExtLinux;

        self.lock()?
            .set()
            .wait_until(deadline)
            .text(text)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}
