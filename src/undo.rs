use crate::errors::{AppError, AppResult};
use crate::models::Record;
use std::collections::VecDeque;

/// Removed records awaiting restoration, most recent at the back.
#[derive(Debug, Default, Clone)]
pub struct UndoStack {
    entries: VecDeque<Record>,
    limit: Option<usize>,
}

impl UndoStack {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    pub fn push(&mut self, record: Record) {
        self.entries.push_back(record);
        if let Some(limit) = self.limit {
            while self.entries.len() > limit {
                if let Some(evicted) = self.entries.pop_front() {
                    tracing::debug!(name = %evicted.name, limit, "undo stack full, dropping oldest entry");
                }
            }
        }
    }

    pub fn pop(&mut self) -> AppResult<Record> {
        self.entries.pop_back().ok_or(AppError::EmptyUndo)
    }

    pub fn peek(&self) -> Option<&Record> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
