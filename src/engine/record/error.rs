//! Record Error Types

use thiserror::Error;

use crate::engine::adapter::AdapterError;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Unknown field '{field}' on {record_type}")]
    UnknownField {
        record_type: &'static str,
        field: String,
    },

    #[error("Type mismatch on field '{field}': {reason}")]
    TypeMismatch { field: String, reason: String },

    #[error("No valid filter fields for {record_type} (dropped: {dropped:?})")]
    EmptyFilter {
        record_type: &'static str,
        dropped: Vec<String>,
    },

    #[error("Cannot decode column '{column}' of {table}: {reason}")]
    Decode {
        table: &'static str,
        column: &'static str,
        reason: String,
    },

    #[error("Invalid schema for {record_type}: {reason}")]
    Schema {
        record_type: &'static str,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] AdapterError),
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;

/// Why a single field could not be read.
///
/// Returned by `FieldReader::try_field_value` so callers can tell an unknown
/// field apart from a reference that failed to load.
#[derive(Error, Debug)]
pub enum FieldAccessError {
    #[error("Unknown field '{field}' on {record_type}")]
    UnknownField {
        record_type: &'static str,
        field: String,
    },

    #[error("Reference '{field}' could not be resolved: {reason}")]
    Unresolved { field: &'static str, reason: String },
}

impl From<FieldAccessError> for RecordError {
    fn from(err: FieldAccessError) -> Self {
        match err {
            FieldAccessError::UnknownField { record_type, field } => {
                RecordError::UnknownField { record_type, field }
            }
            FieldAccessError::Unresolved { field, reason } => RecordError::TypeMismatch {
                field: field.to_string(),
                reason,
            },
        }
    }
}
