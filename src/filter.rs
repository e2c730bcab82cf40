use crate::models::Record;

/// Case-insensitive substring match over name and notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    query: String,
    needle: String,
}

impl SearchFilter {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            needle: query.to_lowercase(),
        }
    }

    pub fn set_query(&mut self, query: &str) {
        *self = Self::new(query);
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        record.name.to_lowercase().contains(&self.needle) || record.notes.to_lowercase().contains(&self.needle)
    }

    /// Matching records with their store index, in store order.
    pub fn apply<'a>(&'a self, records: &'a [Record]) -> impl Iterator<Item = (usize, &'a Record)> + Clone + 'a {
        records
            .iter()
            .enumerate()
            .filter(move |(_, record)| self.matches(record))
    }
}
