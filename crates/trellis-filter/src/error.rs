//! Filter compiler error types

use thiserror::Error;

/// Result type alias for filter operations
pub type FilterResult<T> = std::result::Result<T, FilterError>;

/// Filter-specific error types
///
/// `UnmappedAttributeType` is raised while building definitions at startup.
/// The parse errors are recoverable request errors and always name the full
/// field path of the offending input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Attribute {kind}.{attribute} has type '{ty}' which has no filter operators")]
    UnmappedAttributeType {
        kind: String,
        attribute: String,
        ty: String,
    },

    #[error("Unknown filter field '{field}' on {definition} at {path}")]
    UnknownFilterField {
        field: String,
        definition: String,
        path: String,
    },

    #[error("Invalid filter value at {path}: expected {expected}, found {found}")]
    InvalidFilterValue {
        path: String,
        expected: String,
        found: String,
    },

    #[error("No filter definition for kind {0}")]
    UnknownKind(String),

    #[error("Schema error: {0}")]
    Schema(#[from] trellis_core::Error),
}
