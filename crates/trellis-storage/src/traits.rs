//! Graph store trait definitions

use crate::error::StorageResult;
use async_trait::async_trait;
use trellis_core::{Condition, EdgeOperation, Node, Schema, Variable};

/// Trait for graph store implementations
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Schema the store validates nodes against
    fn schema(&self) -> &Schema;

    // ─────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Nodes of `kind` for which `condition` holds with `variable` bound to
    /// the node
    async fn query(
        &self,
        kind: &str,
        variable: &Variable,
        condition: &Condition,
    ) -> StorageResult<Vec<Node>>;

    /// Get a node by kind and persisted id
    async fn get(&self, kind: &str, id: &str) -> StorageResult<Option<Node>>;

    /// Fetch the nodes related to `node` through `field`
    ///
    /// The result is registered on `node` (and mirrored onto the returned
    /// nodes) before it is handed back.
    async fn load_relationship(&self, node: &mut Node, field: &str) -> StorageResult<Vec<Node>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist nodes and their relationship changes in one transaction
    ///
    /// New nodes get an id. Either every write is applied and every property
    /// committed, or nothing changes. Changes are mirrored onto the opposite
    /// side: a to-one mirror loses its previous edge, and saved nodes see the
    /// new edges in their mirror fields. Returns the edge writes applied.
    async fn save(&self, nodes: &mut [Node]) -> StorageResult<Vec<EdgeOperation>>;
}
