//! Trellis Storage - Graph store contract and reference implementation
//!
//! [`GraphStore`] is what the filter compiler and the relationship engine
//! expect from a persistence layer: condition queries, relationship loading
//! and atomic saves. [`MemoryStorage`] implements it in process.

pub mod error;
mod eval;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use traits::GraphStore;
