//! Error types for Trellis Core

use thiserror::Error;

/// Result type alias using Trellis's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Trellis core error types
///
/// Schema build errors are fatal and surface once at startup. Relationship
/// errors surface at request or save time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Entity kind declared twice: {0}")]
    DuplicateKind(String),

    #[error("Field declared twice on {kind}: {field}")]
    DuplicateField { kind: String, field: String },

    #[error("Field name is reserved for filter combinators on {kind}: {field}")]
    ReservedFieldName { kind: String, field: String },

    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),

    #[error(
        "Ambiguous mirror for {kind}.{field}: {related_kind} has several opposite properties \
         labelled {label} ({candidates:?})"
    )]
    AmbiguousMirror {
        kind: String,
        field: String,
        related_kind: String,
        label: String,
        candidates: Vec<String>,
    },

    #[error("Invalid pattern variable {0:?}: expected a letter or '_' followed by letters, digits or '_'")]
    InvalidVariable(String),

    #[error("Unknown relationship {kind}.{field}")]
    UnknownRelationship { kind: String, field: String },

    #[error("Relationship {field} references node {node} which has no resolvable id")]
    UnresolvedRelationshipDependency { field: String, node: String },

    #[error("Relationship {field} holds one node, got {count}")]
    CardinalityViolation { field: String, count: usize },
}
