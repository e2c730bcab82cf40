use chrono::{DateTime, Local};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub at: DateTime<Local>,
    pub message: String,
}

impl HistoryEntry {
    pub fn render(&self) -> String {
        format!("[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// In-session journal of user actions. Never persisted.
#[derive(Debug, Default, Clone)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: impl Into<String>) {
        self.append_at(Local::now(), message);
    }

    pub fn append_at(&mut self, at: DateTime<Local>, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "history", message = %message);
        self.entries.push(HistoryEntry { at, message });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(HistoryEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
