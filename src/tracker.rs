use crate::config::AppSettings;
use crate::errors::AppResult;
use crate::filter::SearchFilter;
use crate::history::HistoryLog;
use crate::models::{Record, RecordPatch, StoreEvent, StoreStats};
use crate::persistence;
use crate::store::{RecordStore, SubscriptionId};
use std::cell::{Ref, RefCell};
use std::path::Path;
use std::rc::Rc;

/// Owns the single medication list of a session together with its history
/// log and search state. Every command handler goes through this value.
#[derive(Debug)]
pub struct Tracker {
    store: RecordStore,
    history: Rc<RefCell<HistoryLog>>,
    filter: SearchFilter,
    settings: AppSettings,
}

impl Tracker {
    pub fn new(settings: AppSettings) -> Self {
        let mut store = RecordStore::new(settings.undo_limit);
        if let Some(allowed) = settings.allowed_choices() {
            store = store.with_allowed_choices(allowed);
        }

        let history = Rc::new(RefCell::new(HistoryLog::new()));
        let journal = Rc::clone(&history);
        store.subscribe(move |event| {
            if let Some(message) = history_message(event) {
                journal.borrow_mut().append(message);
            }
        });

        Self {
            store,
            history,
            filter: SearchFilter::default(),
            settings,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&StoreEvent) + 'static,
    {
        self.store.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    pub fn history(&self) -> Ref<'_, HistoryLog> {
        self.history.borrow()
    }

    /// Loads the configured data file. A missing file means a first run and
    /// yields an empty list; any other failure leaves the list empty and is
    /// returned for the caller to report.
    pub fn load_on_startup(&mut self) -> AppResult<usize> {
        let path = self.settings.data_file.clone();
        match persistence::load(&path) {
            Ok(records) => {
                let count = self.store.replace_all(records)?;
                self.journal("Data loaded automatically");
                Ok(count)
            }
            Err(error) if error.is_not_found() => {
                tracing::info!(path = %path.display(), "no data file yet, starting with an empty list");
                Ok(0)
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %error, "startup load failed");
                Err(error)
            }
        }
    }

    pub fn save_on_shutdown(&mut self) -> AppResult<()> {
        let path = self.settings.data_file.clone();
        persistence::save(&path, self.store.records()).inspect_err(|error| {
            tracing::warn!(path = %path.display(), error = %error, "shutdown save failed");
        })?;
        self.journal("Data saved automatically");
        Ok(())
    }

    pub fn save(&mut self) -> AppResult<()> {
        let path = self.settings.data_file.clone();
        persistence::save(&path, self.store.records())?;
        self.journal(format!("Data saved to: {}", display_name(&path)));
        Ok(())
    }

    pub fn export(&mut self, path: &Path) -> AppResult<usize> {
        persistence::save(path, self.store.records())?;
        self.journal(format!("Data exported to: {}", display_name(path)));
        Ok(self.store.len())
    }

    /// Replaces the list with the contents of `path`.
    pub fn import(&mut self, path: &Path) -> AppResult<usize> {
        let records = persistence::load(path)?;
        let count = self.store.replace_all(records)?;
        self.journal(format!("Data imported from: {}", display_name(path)));
        Ok(count)
    }

    pub fn add(&mut self, record: Record) -> AppResult<usize> {
        self.store.add(record)
    }

    pub fn remove(&mut self, index: usize) -> AppResult<String> {
        self.store.remove_at(index)
    }

    pub fn undo(&mut self) -> AppResult<usize> {
        self.store.restore_last()
    }

    pub fn edit(&mut self, index: usize, patch: RecordPatch) -> AppResult<()> {
        self.store.edit(index, patch)
    }

    pub fn set_taken(&mut self, index: usize, value: bool) -> AppResult<bool> {
        self.store.set_taken(index, value)
    }

    pub fn move_record(&mut self, from: usize, to: usize) -> AppResult<()> {
        self.store.move_to(from, to)
    }

    pub fn search(&mut self, query: &str) {
        self.filter.set_query(query);
    }

    pub fn query(&self) -> &str {
        self.filter.query()
    }

    /// Rows passing the current search, with their list index.
    pub fn visible(&self) -> Vec<(usize, &Record)> {
        self.filter.apply(self.store.records()).collect()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn taken_records(&self) -> Vec<&Record> {
        self.store.taken_records().collect()
    }

    fn journal(&self, message: impl Into<String>) {
        self.history.borrow_mut().append(message);
    }
}

fn history_message(event: &StoreEvent) -> Option<String> {
    let message = match event {
        StoreEvent::Added { name, .. } => format!("Added: {}", name),
        StoreEvent::Removed { name, .. } => format!("Removed: {}", name),
        StoreEvent::Restored { name, .. } => format!("Undid removal of: {}", name),
        StoreEvent::Edited { name, .. } => format!("Edited: {}", name),
        StoreEvent::TakenChanged { name, taken: true, .. } => format!("Marked as taken: {}", name),
        StoreEvent::TakenChanged { name, taken: false, .. } => format!("Unmarked: {}", name),
        StoreEvent::Moved { name, from, to } => format!("Moved: {} ({} -> {})", name, from + 1, to + 1),
        StoreEvent::Replaced { .. } | StoreEvent::AllTaken => return None,
    };
    Some(message)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
