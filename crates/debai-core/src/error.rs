use thiserror::Error;

/// Top-level error type for DebAI.
///
/// Subsystem crates define their own error types and convert into
/// `DebaiError` where they cross crate boundaries, so `?` works everywhere.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DebaiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for DebaiError {
    fn from(err: toml::de::Error) -> Self {
        DebaiError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DebaiError {
    fn from(err: toml::ser::Error) -> Self {
        DebaiError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DebaiError {
    fn from(err: serde_json::Error) -> Self {
        DebaiError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for DebAI operations.
pub type Result<T> = std::result::Result<T, DebaiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DebaiError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = DebaiError::Duplicate("employee 'Rahul Saha'".to_string());
        assert_eq!(err.to_string(), "Duplicate record: employee 'Rahul Saha'");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DebaiError = io_err.into();
        assert!(matches!(err, DebaiError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: DebaiError = err.unwrap_err().into();
        assert!(matches!(err, DebaiError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: DebaiError = err.unwrap_err().into();
        assert!(matches!(err, DebaiError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
