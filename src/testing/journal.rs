use crate::types::{DeviceId, PeerId};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Acquired {
        device_id: DeviceId,
        stream_id: String,
    },
    Released {
        device_id: Option<DeviceId>,
        track_id: String,
    },
    StreamAdded {
        from: PeerId,
        to: PeerId,
        stream_id: String,
    },
    StreamRemoved {
        from: PeerId,
        to: PeerId,
        stream_id: String,
    },
    Action {
        from: PeerId,
        namespace: String,
        action_id: String,
        payload: String,
    },
}

/// Shared, append-only operation log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: JournalEntry) {
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Entries recorded at or after `mark`.
    pub fn since(&self, mark: usize) -> Vec<JournalEntry> {
        self.entries.lock().iter().skip(mark).cloned().collect()
    }

    /// Payloads of actions sent by `from`, oldest first.
    pub fn actions_from(&self, from: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Action { from: sender, payload, .. } if sender == from => {
                    Some(payload.clone())
                }
                _ => None,
            })
            .collect()
    }
}
