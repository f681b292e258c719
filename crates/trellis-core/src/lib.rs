//! Trellis Core - Schema model and relationship consistency engine
//!
//! This crate holds the entity schema, node aggregates with their
//! relationship state, the condition tree the filter compiler emits, and
//! the diff algorithm that turns local relationship changes into edge
//! writes.

pub mod condition;
pub mod error;
pub mod node;
pub mod property;
pub mod relationship;
pub mod schema;
pub mod value;

pub use condition::{CompareOp, Condition, EdgePattern, Quantifier, Variable, VariableGenerator};
pub use error::{Error, Result};
pub use node::{Node, NodeKey};
pub use property::{EdgeRef, IdLookup, RelationshipDiff, RelationshipProperty};
pub use relationship::{Cardinality, Direction, EdgeOperation, RelationshipDefinition};
pub use schema::{
    AttributeDecl, AttributeType, EntityKind, EntityKindDecl, RelationshipDecl, Schema,
    SchemaBuilder, RESERVED_FIELD_NAMES,
};
pub use value::Value;
