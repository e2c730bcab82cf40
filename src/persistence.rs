//! JSON file gateway for the medication list.
//!
//! The same document format backs the automatic data file and user-chosen
//! export/import paths: a JSON array with one object per record, in list order.

use crate::errors::{AppError, AppResult};
use crate::models::Record;
use crate::store::{check_names, normalize};
use serde_json::{json, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

fn document_schema() -> Value {
    let text = json!({"type": ["string", "null"]});
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "notes": text,
                "dosage": text,
                "frequency": text,
                "taken": {"type": "boolean"},
                "lastTakenAt": text,
                "nome": {"type": "string"},
                "observacoes": text,
                "dosagem": text,
                "frequencia": text,
                "tomado": {"type": "boolean"},
                "dataHoraTomado": text
            },
            "anyOf": [
                {"required": ["name"]},
                {"required": ["nome"]}
            ]
        }
    })
}

/// Writes `records` to `path` through a sibling temp file and a rename, so a
/// crash never leaves a truncated document behind.
pub fn save(path: &Path, records: &[Record]) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|error| write_failure(parent, error))?;
    }

    let bytes = encode(records)?;
    let temp = temp_path(path);
    fs::write(&temp, bytes).map_err(|error| write_failure(&temp, error))?;
    if let Err(error) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(write_failure(path, error));
    }

    tracing::info!(path = %path.display(), count = records.len(), "medication list saved");
    Ok(())
}

pub fn load(path: &Path) -> AppResult<Vec<Record>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(AppError::FileNotFound(path.display().to_string()));
        }
        Err(error) => return Err(AppError::Io(format!("{}: {}", path.display(), error))),
    };

    let records = decode(&bytes).map_err(|error| match error {
        AppError::Parse(message) => AppError::Parse(format!("{}: {}", path.display(), message)),
        other => other,
    })?;
    tracing::info!(path = %path.display(), count = records.len(), "medication list loaded");
    Ok(records)
}

pub fn encode(records: &[Record]) -> AppResult<Vec<u8>> {
    serde_json::to_vec_pretty(records).map_err(|error| AppError::Write(error.to_string()))
}

/// Parses and validates a document: JSON syntax, array-of-objects shape, then
/// the name invariant of the list. Fields are trimmed before the name check.
pub fn decode(bytes: &[u8]) -> AppResult<Vec<Record>> {
    let value: Value = serde_json::from_slice(bytes)?;

    let violations = schema_violations(&value)?;
    if !violations.is_empty() {
        return Err(AppError::Parse(format!(
            "document is not a medication list: {}",
            violations.join("; ")
        )));
    }

    let mut records: Vec<Record> = serde_json::from_value(value)?;
    records.iter_mut().for_each(normalize);
    check_names(&records).map_err(|error| AppError::Parse(error.to_string()))?;
    Ok(records)
}

fn schema_violations(value: &Value) -> AppResult<Vec<String>> {
    let schema = document_schema();
    let compiled = jsonschema::JSONSchema::compile(&schema)
        .map_err(|error| AppError::Parse(format!("Failed to compile document schema: {}", error)))?;

    let violations = compiled
        .validate(value)
        .err()
        .map(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path, error)
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Ok(violations)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "medications.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_failure(path: &Path, error: std::io::Error) -> AppError {
    AppError::Write(format!("{}: {}", path.display(), error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_root() -> tempfile::TempDir {
        tempfile::tempdir().expect("temp data dir")
    }

    fn sample() -> Vec<Record> {
        let mut aspirin = Record::new("Aspirin", "1 tablet", "Daily", "after breakfast");
        let at = chrono::Local
            .with_ymd_and_hms(2024, 5, 14, 9, 30, 0)
            .single()
            .expect("local time");
        aspirin.set_taken(true, at);
        vec![aspirin, Record::new("Zinc", "", "Weekly", "")]
    }

    #[test]
    fn save_then_load_reproduces_the_list() {
        let root = temp_root();
        let path = root.path().join("medications.json");
        save(&path, &sample()).expect("save");
        assert_eq!(load(&path).expect("load"), sample());
    }

    #[test]
    fn save_uses_camel_case_keys_and_leaves_no_temp_file() {
        let root = temp_root();
        let path = root.path().join("nested").join("medications.json");
        save(&path, &sample()).expect("save");

        let raw: Value = serde_json::from_slice(&fs::read(&path).expect("read")).expect("json");
        assert_eq!(raw[0]["lastTakenAt"], "14/05/2024 09:30");
        assert_eq!(raw[0]["taken"], true);
        assert!(raw[1].get("lastTakenAt").is_none());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn save_replaces_existing_document() {
        let root = temp_root();
        let path = root.path().join("medications.json");
        save(&path, &sample()).expect("first save");
        save(&path, &sample()[1..]).expect("second save");
        assert_eq!(load(&path).expect("load").len(), 1);
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let root = temp_root();
        let error = load(&root.path().join("absent.json")).expect_err("missing");
        assert!(error.is_not_found());
    }

    #[test]
    fn malformed_json_is_a_parse_failure() {
        let root = temp_root();
        let path = root.path().join("broken.json");
        fs::write(&path, "[{\"name\": ").expect("write");
        let error = load(&path).expect_err("malformed");
        assert!(matches!(error, AppError::Parse(message) if message.contains("broken.json")));
    }

    #[test]
    fn wrong_shape_lists_each_violation() {
        let error = decode(br#"{"name": "Aspirin"}"#).expect_err("object document");
        assert!(matches!(error, AppError::Parse(_)));

        let error = decode(br#"[{"notes": "no name"}, {"name": "Zinc", "taken": "yes"}]"#)
            .expect_err("bad items");
        let AppError::Parse(message) = error else {
            panic!("expected parse failure");
        };
        assert!(message.contains("/0"));
        assert!(message.contains("/1/taken"));
    }

    #[test]
    fn duplicate_names_are_rejected_on_load() {
        let error = decode(br#"[{"name": "Aspirin"}, {"name": "ASPIRIN"}]"#).expect_err("duplicates");
        assert!(matches!(error, AppError::Parse(message) if message.contains("DUPLICATE_NAME")));
    }

    #[test]
    fn legacy_documents_import() {
        let raw = r#"[{"nome": "Dipirona", "observacoes": "Tomar apos refeicao",
            "dosagem": "1 comprimido", "frequencia": "8/8h",
            "tomado": true, "dataHoraTomado": "14/05/2024 09:30"}]"#;
        let records = decode(raw.as_bytes()).expect("legacy document");
        assert_eq!(records[0].name, "Dipirona");
        assert!(records[0].taken);
        assert_eq!(records[0].last_taken_at.as_deref(), Some("14/05/2024 09:30"));
    }

    #[test]
    fn records_without_optional_fields_default() {
        let records = decode(br#"[{"name": "Aspirin"}]"#).expect("minimal document");
        assert_eq!(records, vec![Record::new("Aspirin", "", "", "")]);
    }

    #[test]
    fn padded_names_collide_in_either_order() {
        for raw in [
            br#"[{"name": " Aspirin"}, {"name": "aspirin"}]"#.as_slice(),
            br#"[{"name": "aspirin"}, {"name": " Aspirin"}]"#.as_slice(),
        ] {
            let error = decode(raw).expect_err("names differ only by padding");
            assert!(matches!(error, AppError::Parse(message) if message.contains("DUPLICATE_NAME")));
        }

        let records = decode(br#"[{"name": " Aspirin ", "dosage": " 1 tablet"}]"#).expect("padded");
        assert_eq!(records[0].name, "Aspirin");
        assert_eq!(records[0].dosage, "1 tablet");
    }

    #[test]
    fn pending_records_drop_stale_timestamps() {
        let records = decode(
            br#"[{"name": "Aspirin", "taken": false, "lastTakenAt": "14/05/2024 09:30"},
                {"name": "Zinc", "taken": true, "lastTakenAt": "14/05/2024 10:00"}]"#,
        )
        .expect("document");
        assert_eq!(records[0].last_taken_at, None);
        assert_eq!(records[1].last_taken_at.as_deref(), Some("14/05/2024 10:00"));
    }

    #[test]
    fn unwritable_target_is_a_write_failure() {
        let root = temp_root();
        let blocker = root.path().join("blocker");
        fs::write(&blocker, "plain file").expect("write");
        let error = save(&blocker.join("medications.json"), &sample()).expect_err("parent is a file");
        assert!(matches!(error, AppError::Write(_)));

        let directory = root.path().join("taken-by-dir");
        fs::create_dir(&directory).expect("mkdir");
        let error = save(&directory, &sample()).expect_err("target is a directory");
        assert!(matches!(error, AppError::Write(_)));
        assert!(!temp_path(&directory).exists());
    }
}
