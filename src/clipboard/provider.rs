//! Local clipboard access
//!
//! The bridge only needs to read and write plain text. `SystemClipboard`
//! talks to the OS through arboard; `MemoryClipboard` keeps the text in
//! process for tests and headless runs.

use std::sync::Mutex;

use arboard::Clipboard;
use tracing::debug;

use crate::error::{ClipboardError, ClipboardResult};

/// Read/write access to a text clipboard
pub trait ClipboardProvider: Send + Sync {
    /// Returns the current clipboard text
    fn read(&self) -> ClipboardResult<String>;

    /// Replaces the clipboard text
    fn write(&self, text: &str) -> ClipboardResult<()>;
}

/// The operating system clipboard
///
/// A fresh arboard handle is opened per call; some platforms do not allow
/// a handle to be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    /// Creates a new system clipboard accessor
    pub fn new() -> Self {
        Self
    }

    fn open() -> ClipboardResult<Clipboard> {
        Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))
    }
}

impl ClipboardProvider for SystemClipboard {
    fn read(&self) -> ClipboardResult<String> {
        match Self::open()?.get_text() {
            Ok(text) => Ok(text),
            // Non-text content reads as empty
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(ClipboardError::ReadFailed(e.to_string())),
        }
    }

    fn write(&self, text: &str) -> ClipboardResult<()> {
        Self::open()?
            .set_text(text)
            .map_err(|e| ClipboardError::WriteFailed(e.to_string()))?;
        debug!("Set clipboard text: {} chars", text.len());
        Ok(())
    }
}

/// In-process clipboard
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<String>,
}

impl MemoryClipboard {
    /// Creates a clipboard holding `text`
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(text.into()),
        }
    }
}

impl ClipboardProvider for MemoryClipboard {
    fn read(&self) -> ClipboardResult<String> {
        self.text
            .lock()
            .map(|text| text.clone())
            .map_err(|_| ClipboardError::ReadFailed("clipboard lock poisoned".to_string()))
    }

    fn write(&self, text: &str) -> ClipboardResult<()> {
        let mut guard = self
            .text
            .lock()
            .map_err(|_| ClipboardError::WriteFailed("clipboard lock poisoned".to_string()))?;
        *guard = text.to_string();
        Ok(())
    }
}
