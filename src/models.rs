use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Format of `lastTakenAt`, e.g. `14/05/2024 09:30`.
pub const TAKEN_AT_FORMAT: &str = "%d/%m/%Y %H:%M";

/// One medication entry.
///
/// Legacy files written by the first desktop version used Portuguese keys;
/// those are accepted as aliases on read and never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(default, alias = "observacoes", deserialize_with = "null_as_empty")]
    pub notes: String,
    #[serde(default, alias = "dosagem", deserialize_with = "null_as_empty")]
    pub dosage: String,
    #[serde(default, alias = "frequencia", deserialize_with = "null_as_empty")]
    pub frequency: String,
    #[serde(default, alias = "tomado")]
    pub taken: bool,
    #[serde(
        default,
        alias = "dataHoraTomado",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_as_none"
    )]
    pub last_taken_at: Option<String>,
}

impl Record {
    pub fn new(
        name: impl Into<String>,
        dosage: impl Into<String>,
        frequency: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            notes: notes.into(),
            dosage: dosage.into(),
            frequency: frequency.into(),
            taken: false,
            last_taken_at: None,
        }
    }

    /// Applies a taken transition and recomputes `last_taken_at`.
    /// Returns false when `value` equals the current state.
    pub fn set_taken(&mut self, value: bool, at: DateTime<Local>) -> bool {
        if self.taken == value {
            return false;
        }
        self.taken = value;
        self.last_taken_at = value.then(|| at.format(TAKEN_AT_FORMAT).to_string());
        true
    }

    pub fn name_matches(&self, other: &str) -> bool {
        self.name.trim().to_lowercase() == other.trim().to_lowercase()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({}) ", self.name, self.dosage, self.frequency)?;
        match (self.taken, self.last_taken_at.as_deref()) {
            (true, Some(at)) => write!(f, "Taken: {}", at),
            (true, None) => write!(f, "Taken"),
            (false, _) => write!(f, "Pending"),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|value| !value.trim().is_empty()))
}

/// Field replacements for an edit. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub notes: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.dosage.is_none() && self.frequency.is_none() && self.notes.is_none()
    }
}

/// Change notification published by the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added { index: usize, name: String },
    Removed { index: usize, name: String },
    Restored { index: usize, name: String },
    Moved { from: usize, to: usize, name: String },
    Edited { index: usize, name: String },
    TakenChanged { index: usize, name: String, taken: bool },
    Replaced { count: usize },
    /// Every record is taken after the transition that produced this event.
    AllTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: usize,
    pub taken: usize,
    pub pending: usize,
}

impl StoreStats {
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.taken as f64 * 100.0 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 5, 14, 9, 30, 0)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn taken_transition_recomputes_timestamp() {
        let mut record = Record::new("Aspirin", "1 tablet", "Daily", "");
        assert!(record.set_taken(true, fixed_time()));
        assert_eq!(record.last_taken_at.as_deref(), Some("14/05/2024 09:30"));

        assert!(!record.set_taken(true, fixed_time()));
        assert!(record.set_taken(false, fixed_time()));
        assert_eq!(record.last_taken_at, None);
    }

    #[test]
    fn display_shows_pending_or_taken() {
        let mut record = Record::new("Aspirin", "1 tablet", "Daily", "");
        assert_eq!(record.to_string(), "Aspirin - 1 tablet (Daily) Pending");
        record.set_taken(true, fixed_time());
        assert_eq!(record.to_string(), "Aspirin - 1 tablet (Daily) Taken: 14/05/2024 09:30");
    }

    #[test]
    fn decodes_legacy_keys_and_nulls() {
        let raw = r#"{"nome":"Dipirona","observacoes":null,"dosagem":"1 comprimido",
            "frequencia":"8/8h","tomado":false,"dataHoraTomado":""}"#;
        let record: Record = serde_json::from_str(raw).expect("legacy record");
        assert_eq!(record.name, "Dipirona");
        assert_eq!(record.notes, "");
        assert_eq!(record.frequency, "8/8h");
        assert_eq!(record.last_taken_at, None);
    }

    #[test]
    fn omits_absent_timestamp_when_encoding() {
        let record = Record::new("Aspirin", "", "", "");
        let value = serde_json::to_value(&record).expect("encode");
        assert!(value.get("lastTakenAt").is_none());
        assert_eq!(value["name"], "Aspirin");
    }

    #[test]
    fn completion_rate_handles_empty_store() {
        let empty = StoreStats { total: 0, taken: 0, pending: 0 };
        assert_eq!(empty.completion_rate(), 0.0);
        let half = StoreStats { total: 4, taken: 2, pending: 2 };
        assert!((half.completion_rate() - 50.0).abs() < f64::EPSILON);
    }
}
