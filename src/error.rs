//! Error types for cteforge.

use thiserror::Error;

/// The main error type for cteforge operations.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A required sheet, row or column is absent from the document.
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    /// A cell holds a value that cannot be converted to its typed field.
    #[error("Invalid value in sheet '{sheet}', row {row}, column '{column}': {message}")]
    InvalidValue {
        sheet: String,
        row: usize,
        column: String,
        message: String,
    },

    /// The configuration document is not valid JSON.
    #[error("Document error: {0}")]
    Document(#[from] serde_json::Error),

    /// Settings error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Create a missing-configuration error for a sheet and the item it lacks.
    pub fn missing(sheet: &str, what: impl std::fmt::Display) -> Self {
        Self::ConfigurationMissing(format!("sheet '{}': {}", sheet, what))
    }

    /// Create an invalid-value error. `row` is 1-based.
    pub fn invalid(sheet: &str, row: usize, column: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            sheet: sheet.to_string(),
            row,
            column: column.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for cteforge operations.
pub type ForgeResult<T> = Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForgeError::missing("Model", "no rows");
        assert_eq!(err.to_string(), "Missing configuration: sheet 'Model': no rows");
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ForgeError::invalid("Column Mappings", 3, "Ordinal Position", "expected an integer");
        assert_eq!(
            err.to_string(),
            "Invalid value in sheet 'Column Mappings', row 3, column 'Ordinal Position': expected an integer"
        );
    }
}
