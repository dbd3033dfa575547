//! Bounded in-memory clipboard history

use std::collections::VecDeque;

use time::OffsetDateTime;
use uuid::Uuid;

/// Where a clipboard entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOrigin {
    /// Copied on this machine
    Local,
    /// Received from the peer
    Remote,
}

/// One remembered clipboard value
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardEntry {
    /// Stable identifier, used to copy the entry back
    pub id: Uuid,
    /// Where the content came from
    pub origin: ClipboardOrigin,
    /// Clipboard text
    pub content: String,
    /// When the entry was recorded
    pub captured_at: OffsetDateTime,
}

/// Newest-last list of clipboard entries, capped at `capacity`
#[derive(Debug)]
pub struct ClipboardHistory {
    entries: VecDeque<ClipboardEntry>,
    capacity: usize,
}

impl ClipboardHistory {
    /// Creates an empty history; a zero capacity is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records an entry, evicting the oldest when full
    pub fn record(&mut self, origin: ClipboardOrigin, content: &str) -> Uuid {
        let entry = ClipboardEntry {
            id: Uuid::new_v4(),
            origin,
            content: content.to_string(),
            captured_at: OffsetDateTime::now_utc(),
        };
        let id = entry.id;

        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        id
    }

    /// Looks an entry up by id
    pub fn get(&self, id: Uuid) -> Option<&ClipboardEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Removes an entry, returning it if it was held
    pub fn remove(&mut self, id: Uuid) -> Option<ClipboardEntry> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        self.entries.remove(index)
    }

    /// Copies out every entry, oldest first
    pub fn snapshot(&self) -> Vec<ClipboardEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
