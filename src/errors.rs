use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("EMPTY_NAME: medication name must not be empty")]
    EmptyName,
    #[error("DUPLICATE_NAME: a medication named '{0}' already exists")]
    DuplicateName(String),
    #[error("INDEX_OUT_OF_RANGE: no medication at index {index} (list has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("EMPTY_UNDO: nothing to undo")]
    EmptyUndo,
    #[error("INVALID_CHOICE: '{value}' is not an allowed {field}")]
    InvalidChoice { field: &'static str, value: String },
    #[error("FILE_NOT_FOUND: {0}")]
    FileNotFound(String),
    #[error("PARSE_FAILURE: {0}")]
    Parse(String),
    #[error("WRITE_FAILURE: {0}")]
    Write(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("CONFIG_INVALID: {0}")]
    Config(String),
    #[error("CLI_INVALID: {0}")]
    Cli(String),
}

impl AppError {
    /// Missing data files are an expected first-run condition, not a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Config(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn messages_carry_error_codes() {
        assert!(AppError::EmptyName.to_string().starts_with("EMPTY_NAME"));
        assert_eq!(
            AppError::IndexOutOfRange { index: 3, len: 2 }.to_string(),
            "INDEX_OUT_OF_RANGE: no medication at index 3 (list has 2)"
        );
        assert!(AppError::DuplicateName("Aspirin".to_string())
            .to_string()
            .contains("'Aspirin'"));
    }

    #[test]
    fn json_errors_map_to_parse_failures() {
        let error = serde_json::from_str::<serde_json::Value>("[").expect_err("truncated json");
        let error = AppError::from(error);
        assert!(matches!(error, AppError::Parse(_)));
        assert!(!error.is_not_found());
    }
}
