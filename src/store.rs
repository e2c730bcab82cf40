use crate::errors::{AppError, AppResult};
use crate::filter::SearchFilter;
use crate::models::{Record, RecordPatch, StoreEvent, StoreStats};
use crate::undo::UndoStack;
use chrono::{DateTime, Local};
use std::fmt;

type Subscriber = Box<dyn FnMut(&StoreEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Allowed values for dosage and frequency when suggestions are enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedChoices {
    pub dosage: Vec<String>,
    pub frequency: Vec<String>,
}

impl AllowedChoices {
    fn check(&self, field: &'static str, options: &[String], value: &str) -> AppResult<()> {
        if value.is_empty() || options.iter().any(|option| option.to_lowercase() == value.to_lowercase()) {
            return Ok(());
        }
        Err(AppError::InvalidChoice {
            field,
            value: value.to_string(),
        })
    }

    fn check_record(&self, dosage: &str, frequency: &str) -> AppResult<()> {
        self.check("dosage", &self.dosage, dosage)?;
        self.check("frequency", &self.frequency, frequency)
    }
}

/// Ordered medication list. Removed records move to the owned undo stack.
pub struct RecordStore {
    records: Vec<Record>,
    undo: UndoStack,
    allowed: Option<AllowedChoices>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("records", &self.records)
            .field("undo", &self.undo)
            .field("allowed", &self.allowed)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RecordStore {
    pub fn new(undo_limit: Option<usize>) -> Self {
        Self {
            records: Vec::new(),
            undo: UndoStack::new(undo_limit),
            allowed: None,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn with_allowed_choices(mut self, allowed: AllowedChoices) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&StoreEvent) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|record| record.name_matches(name))
    }

    pub fn add(&mut self, mut record: Record) -> AppResult<usize> {
        normalize(&mut record);
        if record.name.is_empty() {
            return Err(AppError::EmptyName);
        }
        if self.position_of(&record.name).is_some() {
            return Err(AppError::DuplicateName(record.name));
        }
        if let Some(allowed) = &self.allowed {
            allowed.check_record(&record.dosage, &record.frequency)?;
        }

        let name = record.name.clone();
        self.records.push(record);
        let index = self.records.len() - 1;
        tracing::info!(name = %name, index, "medication added");
        self.emit(StoreEvent::Added { index, name });
        Ok(index)
    }

    /// Detaches the record at `index` onto the undo stack and returns its name.
    pub fn remove_at(&mut self, index: usize) -> AppResult<String> {
        self.check_index(index)?;
        let record = self.records.remove(index);
        let name = record.name.clone();
        self.undo.push(record);
        tracing::info!(name = %name, index, "medication removed");
        self.emit(StoreEvent::Removed {
            index,
            name: name.clone(),
        });
        Ok(name)
    }

    /// Pops the most recent removal and appends it at the end of the list.
    ///
    /// A record whose name was reused while it sat on the undo stack is put
    /// back on the stack and the restore fails.
    pub fn restore_last(&mut self) -> AppResult<usize> {
        let record = self.undo.pop()?;
        if self.position_of(&record.name).is_some() {
            let name = record.name.clone();
            self.undo.push(record);
            tracing::warn!(name = %name, "restore blocked by an active medication with the same name");
            return Err(AppError::DuplicateName(name));
        }

        let name = record.name.clone();
        self.records.push(record);
        let index = self.records.len() - 1;
        tracing::info!(name = %name, index, "medication restored");
        self.emit(StoreEvent::Restored { index, name });
        Ok(index)
    }

    pub fn move_to(&mut self, from: usize, to: usize) -> AppResult<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        let record = self.records.remove(from);
        let name = record.name.clone();
        self.records.insert(to, record);
        tracing::debug!(name = %name, from, to, "medication moved");
        self.emit(StoreEvent::Moved { from, to, name });
        Ok(())
    }

    pub fn edit(&mut self, index: usize, patch: RecordPatch) -> AppResult<()> {
        self.check_index(index)?;

        let name = match patch.name.as_deref().map(str::trim) {
            Some("") => return Err(AppError::EmptyName),
            Some(name) => {
                let clash = self
                    .records
                    .iter()
                    .enumerate()
                    .any(|(position, other)| position != index && other.name_matches(name));
                if clash {
                    return Err(AppError::DuplicateName(name.to_string()));
                }
                Some(name.to_string())
            }
            None => None,
        };
        let dosage = patch.dosage.map(|value| value.trim().to_string());
        let frequency = patch.frequency.map(|value| value.trim().to_string());
        if let Some(allowed) = &self.allowed {
            let current = &self.records[index];
            allowed.check_record(
                dosage.as_deref().unwrap_or(&current.dosage),
                frequency.as_deref().unwrap_or(&current.frequency),
            )?;
        }

        let record = &mut self.records[index];
        if let Some(name) = name {
            record.name = name;
        }
        if let Some(dosage) = dosage {
            record.dosage = dosage;
        }
        if let Some(frequency) = frequency {
            record.frequency = frequency;
        }
        if let Some(notes) = patch.notes {
            record.notes = notes.trim().to_string();
        }

        let name = record.name.clone();
        tracing::info!(name = %name, index, "medication edited");
        self.emit(StoreEvent::Edited { index, name });
        Ok(())
    }

    pub fn set_taken(&mut self, index: usize, value: bool) -> AppResult<bool> {
        self.set_taken_at(index, value, Local::now())
    }

    /// Returns false when the record already had `value`; nothing is emitted then.
    pub fn set_taken_at(&mut self, index: usize, value: bool, at: DateTime<Local>) -> AppResult<bool> {
        self.check_index(index)?;
        let record = &mut self.records[index];
        if !record.set_taken(value, at) {
            return Ok(false);
        }

        let name = record.name.clone();
        tracing::info!(name = %name, index, taken = value, "taken status changed");
        self.emit(StoreEvent::TakenChanged {
            index,
            name,
            taken: value,
        });
        if value && self.all_taken() {
            tracing::info!(count = self.records.len(), "all medications taken");
            self.emit(StoreEvent::AllTaken);
        }
        Ok(true)
    }

    /// Lazily yields `(index, record)` pairs matching `query`, in store order.
    pub fn find(&self, query: &str) -> impl Iterator<Item = (usize, &Record)> + Clone + '_ {
        let filter = SearchFilter::new(query);
        self.records
            .iter()
            .enumerate()
            .filter(move |(_, record)| filter.matches(record))
    }

    /// Replaces the whole list, as done by load and import.
    pub fn replace_all(&mut self, mut records: Vec<Record>) -> AppResult<usize> {
        records.iter_mut().for_each(normalize);
        check_names(&records)?;
        self.records = records;
        let count = self.records.len();
        tracing::info!(count, "medication list replaced");
        self.emit(StoreEvent::Replaced { count });
        Ok(count)
    }

    pub fn all_taken(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|record| record.taken)
    }

    pub fn taken_records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().filter(|record| record.taken)
    }

    pub fn stats(&self) -> StoreStats {
        let total = self.records.len();
        let taken = self.taken_records().count();
        StoreStats {
            total,
            taken,
            pending: total - taken,
        }
    }

    fn check_index(&self, index: usize) -> AppResult<()> {
        if index >= self.records.len() {
            return Err(AppError::IndexOutOfRange {
                index,
                len: self.records.len(),
            });
        }
        Ok(())
    }

    fn emit(&mut self, event: StoreEvent) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&event);
        }
    }
}

/// Checks the name invariant over a candidate list.
pub fn check_names(records: &[Record]) -> AppResult<()> {
    for (position, record) in records.iter().enumerate() {
        if record.name.trim().is_empty() {
            return Err(AppError::EmptyName);
        }
        if records[..position].iter().any(|earlier| earlier.name_matches(&record.name)) {
            return Err(AppError::DuplicateName(record.name.clone()));
        }
    }
    Ok(())
}

/// Trims every text field and drops a timestamp left on a pending record.
pub fn normalize(record: &mut Record) {
    record.name = record.name.trim().to_string();
    record.dosage = record.dosage.trim().to_string();
    record.frequency = record.frequency.trim().to_string();
    record.notes = record.notes.trim().to_string();
    if !record.taken {
        record.last_taken_at = None;
    }
}
