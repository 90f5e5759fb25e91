use std::sync::Mutex;
use std::time::Instant;

use super::{ClipboardAccess, ClipboardError};

#[derive(Debug, Default)]
struct MemoryState {
    text: String,
    writes: usize,
    fail_reads: bool,
    fail_writes: bool,
    held_until: Option<Instant>,
}

/// In-process clipboard slot with the same semantics as the OS clipboard.
///
/// `copy` simulates a user copying text from another application; only
/// `write_text` (the sync loop writing to the clipboard) is counted.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    state: Mutex<MemoryState>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        let clipboard = Self::new();
        clipboard.copy(text);
        clipboard
    }

    pub fn copy(&self, text: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.text = text.into();
        }
    }

    pub fn contents(&self) -> String {
        self.state
            .lock()
            .map(|state| state.text.clone())
            .unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().map(|state| state.writes).unwrap_or(0)
    }

    /// Make subsequent reads fail until switched off again.
    pub fn set_read_failure(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_reads = fail;
        }
    }

    /// Deadline passed to the last `write_and_hold`.
    pub fn held_until(&self) -> Option<Instant> {
        self.state.lock().ok().and_then(|state| state.held_until)
    }

    pub fn set_write_failure(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_writes = fail;
        }
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        let state = self
            .state
            .lock()
            .map_err(|_| ClipboardError::Unavailable("clipboard lock poisoned".to_string()))?;

        if state.fail_reads {
            return Err(ClipboardError::Read("simulated read failure".to_string()));
        }
        Ok(state.text.clone())
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ClipboardError::Unavailable("clipboard lock poisoned".to_string()))?;

        if state.fail_writes {
            return Err(ClipboardError::Write("simulated write failure".to_string()));
        }
        state.text = text.to_string();
        state.writes += 1;
        Ok(())
    }

    fn write_and_hold(&self, text: &str, deadline: Instant) -> Result<(), ClipboardError> {
        self.write_text(text)?;
        if let Ok(mut state) = self.state.lock() {
            state.held_until = Some(deadline);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_clipboard_reads_empty_string() {
        let clipboard = MemoryClipboard::new();
        assert_eq!(clipboard.read_text().unwrap(), "");
    }

    #[test]
    fn test_user_copy_is_not_counted_as_write() {
        let clipboard = MemoryClipboard::with_text("hello");
        assert_eq!(clipboard.read_text().unwrap(), "hello");
        assert_eq!(clipboard.write_count(), 0);
    }

    #[test]
    fn test_write_text_replaces_contents() {
        let clipboard = MemoryClipboard::with_text("old");
        clipboard.write_text("new").unwrap();
        assert_eq!(clipboard.contents(), "new");
        assert_eq!(clipboard.write_count(), 1);
    }

    #[test]
    fn test_read_failure_toggle() {
        let clipboard = MemoryClipboard::with_text("x");
        clipboard.set_read_failure(true);
        assert!(clipboard.read_text().is_err());
        clipboard.set_read_failure(false);
        assert_eq!(clipboard.read_text().unwrap(), "x");
    }
}
