//! Relationship definitions: directed typed edges between entity kinds

use crate::condition::{EdgePattern, Variable};
use crate::error::Result;
use crate::node::{Node, NodeKey};
use crate::property::{IdLookup, RelationshipDiff};
use crate::schema::RelationshipDecl;
use serde::{Deserialize, Serialize};

/// Direction of an edge, seen from the node declaring the relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "OUTGOING")]
    Outgoing,
    #[serde(alias = "INCOMING")]
    Incoming,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Outgoing => Self::Incoming,
            Self::Incoming => Self::Outgoing,
        }
    }
}

/// How many nodes a relationship field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    #[default]
    Many,
}

/// Edge write produced by a save
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum EdgeOperation {
    Create { from: String, to: String, label: String },
    Delete { from: String, to: String, label: String },
}

/// Static description of one relationship field on one kind
///
/// Resolved once by the schema build, including the field on the related
/// kind that mirrors this one (same label, opposite direction), if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDefinition {
    kind: String,
    field: String,
    related_kind: String,
    label: String,
    direction: Direction,
    cardinality: Cardinality,
    remote_field: Option<String>,
}

impl RelationshipDefinition {
    pub(crate) fn new(kind: &str, decl: &RelationshipDecl, remote_field: Option<String>) -> Self {
        Self {
            kind: kind.to_string(),
            field: decl.field.clone(),
            related_kind: decl.kind.clone(),
            label: decl.label.clone(),
            direction: decl.direction,
            cardinality: decl.cardinality,
            remote_field,
        }
    }

    /// Kind declaring the relationship
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn related_kind(&self) -> &str {
        &self.related_kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Mirror field on the related kind
    pub fn remote_field(&self) -> Option<&str> {
        self.remote_field.as_deref()
    }

    /// Edge pattern from `root` (a node of this kind) to `related`
    pub fn generate_relationship(&self, root: &Variable, related: &Variable) -> EdgePattern {
        EdgePattern {
            root: root.clone(),
            related: related.clone(),
            label: self.label.clone(),
            direction: self.direction,
        }
    }

    /// Register the related nodes a query fetched for `node`
    ///
    /// Each related node also learns about `node` through its mirror field,
    /// so the other side needs no second fetch.
    pub fn register_query_result<'a>(
        &self,
        node: &mut Node,
        related: impl IntoIterator<Item = &'a mut Node>,
    ) -> Result<()> {
        let mut related: Vec<&'a mut Node> = related.into_iter().collect();
        let keys: Vec<NodeKey> = related.iter().map(|n| n.key()).collect();

        node.property_mut(&self.field)?
            .register_query_result(keys.iter().copied());

        if let Some(remote) = &self.remote_field {
            for remote_node in related.iter_mut() {
                remote_node.property_mut(remote)?.register_remote(node.key());
            }
        }

        tracing::debug!(
            "Registered {} related nodes on {}.{}",
            keys.len(),
            self.kind,
            self.field
        );
        Ok(())
    }

    pub fn get_relationship_diff(
        &self,
        node: &Node,
        lookup: &impl IdLookup,
    ) -> Result<RelationshipDiff> {
        node.property(&self.field)?.compute_diff(&node.key(), lookup)
    }

    /// Locally added nodes, candidates for a cascading save
    pub fn get_related_nodes_to_save(&self, node: &Node) -> Result<Vec<NodeKey>> {
        Ok(node.property(&self.field)?.related_nodes_to_save())
    }

    /// Orient a diff into edge writes
    pub fn edge_operations(&self, diff: &RelationshipDiff) -> Vec<EdgeOperation> {
        let orient = |local: &str, related: &str| match self.direction {
            Direction::Outgoing => (local.to_string(), related.to_string()),
            Direction::Incoming => (related.to_string(), local.to_string()),
        };

        let creates = diff.edges_to_add.iter().map(|e| {
            let (from, to) = orient(&e.local, &e.related);
            EdgeOperation::Create {
                from,
                to,
                label: self.label.clone(),
            }
        });
        let deletes = diff.edges_to_remove.iter().map(|e| {
            let (from, to) = orient(&e.local, &e.related);
            EdgeOperation::Delete {
                from,
                to,
                label: self.label.clone(),
            }
        });

        creates.chain(deletes).collect()
    }
}
