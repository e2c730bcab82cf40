use crate::errors::{AppError, AppResult};
use crate::store::AllowedChoices;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "med-tracker.yaml";
pub const DEFAULT_DATA_FILE: &str = "medications.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub data_file: PathBuf,
    pub log_dir: PathBuf,
    pub log_filter: String,
    pub dosage_options: Vec<String>,
    pub frequency_options: Vec<String>,
    pub strict_suggestions: bool,
    pub undo_limit: Option<usize>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            log_dir: PathBuf::from(".med-tracker").join("logs"),
            log_filter: "info".to_string(),
            dosage_options: ["1 tablet", "2 tablets", "5ml", "10ml", "1 drop", "2 drops"]
                .into_iter()
                .map(String::from)
                .collect(),
            frequency_options: ["Daily", "Every 12h", "Every 8h", "Weekly", "As needed"]
                .into_iter()
                .map(String::from)
                .collect(),
            strict_suggestions: false,
            undo_limit: None,
        }
    }
}

impl AppSettings {
    /// Reads `explicit` (which must exist), or the default config file in the
    /// working directory when present, or falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|error| AppError::Config(format!("{}: {}", path.display(), error)))?;
        Self::from_yaml(&raw).map_err(|error| match error {
            AppError::Config(message) => AppError::Config(format!("{}: {}", path.display(), message)),
            other => other,
        })
    }

    pub fn from_yaml(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn allowed_choices(&self) -> Option<AllowedChoices> {
        self.strict_suggestions.then(|| AllowedChoices {
            dosage: self.dosage_options.clone(),
            frequency: self.frequency_options.clone(),
        })
    }

    fn validate(&self) -> AppResult<()> {
        if self.data_file.as_os_str().is_empty() {
            return Err(AppError::Config("dataFile must not be empty".to_string()));
        }
        if self.undo_limit == Some(0) {
            return Err(AppError::Config(
                "undoLimit must be at least 1; omit it for an unbounded undo history".to_string(),
            ));
        }
        if self.strict_suggestions && (self.dosage_options.is_empty() || self.frequency_options.is_empty()) {
            return Err(AppError::Config(
                "strictSuggestions requires non-empty dosageOptions and frequencyOptions".to_string(),
            ));
        }
        Ok(())
    }
}
