//! Trellis Filter - Filter compiler for the typed entity graph
//!
//! Builds per-kind filter definitions from a [`trellis_core::Schema`], parses
//! nested JSON filter literals against them and turns the result into a
//! [`trellis_core::Condition`].

pub mod definition;
pub mod describe;
pub mod entry;
pub mod error;
pub mod operator;
mod parse;

pub use definition::{
    FieldFilterDefinition, FilterDefinition, FilterField, FilterSchema, SubFilterDefinition,
    COMBINATORS,
};
pub use describe::{FieldDescription, FilterDescription, QuantifierDescription};
pub use entry::{
    ConditionGenerator, Filter, FilterEntry, NodeFilter, QuantifiedFilterEntry, ScalarFilterEntry,
    ScalarPredicate,
};
pub use error::{FilterError, FilterResult};
pub use operator::{operators_for, ScalarOperator};
