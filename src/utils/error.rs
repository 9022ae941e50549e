use thiserror::Error;

use crate::core::validate::ValidationError;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Column {column:?} not in {source_name}")]
    UnknownColumn { column: String, source_name: String },

    #[error("Source error: {message}")]
    Source { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CheckError {
    pub(crate) fn source_error(message: impl Into<String>) -> Self {
        CheckError::Source {
            message: message.into(),
        }
    }

    pub(crate) fn unknown_column(column: impl Into<String>, source: impl Into<String>) -> Self {
        CheckError::UnknownColumn {
            column: column.into(),
            source_name: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;
