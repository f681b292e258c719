//! Node (entity instance) types

use crate::error::{Error, Result};
use crate::property::RelationshipProperty;
use crate::schema::EntityKind;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

/// In-memory identity of a node, stable for the node's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey(pub Ulid);

impl NodeKey {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for NodeKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An entity in the graph, together with its relationship state
#[derive(Debug, Clone)]
pub struct Node {
    key: NodeKey,
    kind: String,

    /// Persisted id, None until the node has been saved
    id: Option<String>,

    attributes: BTreeMap<String, Value>,
    relationships: BTreeMap<String, RelationshipProperty>,
}

impl Node {
    /// Create an unsaved node with one empty property per relationship
    pub fn new(kind: &EntityKind) -> Self {
        let relationships = kind
            .relationships()
            .iter()
            .map(|r| {
                (
                    r.field().to_string(),
                    RelationshipProperty::new(r.field(), r.cardinality()),
                )
            })
            .collect();

        Self {
            key: NodeKey::new(),
            kind: kind.name().to_string(),
            id: None,
            attributes: BTreeMap::new(),
            relationships,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn property(&self, field: &str) -> Result<&RelationshipProperty> {
        self.relationships
            .get(field)
            .ok_or_else(|| self.unknown_relationship(field))
    }

    pub fn property_mut(&mut self, field: &str) -> Result<&mut RelationshipProperty> {
        let kind = &self.kind;
        self.relationships
            .get_mut(field)
            .ok_or_else(|| Error::UnknownRelationship {
                kind: kind.clone(),
                field: field.to_string(),
            })
    }

    pub fn properties(&self) -> impl Iterator<Item = &RelationshipProperty> {
        self.relationships.values()
    }

    /// True if any relationship has local changes not yet persisted
    pub fn has_changes(&self) -> bool {
        self.relationships.values().any(|p| p.has_changes())
    }

    fn unknown_relationship(&self, field: &str) -> Error {
        Error::UnknownRelationship {
            kind: self.kind.clone(),
            field: field.to_string(),
        }
    }
}
