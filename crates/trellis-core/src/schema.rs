//! Schema declarations and the schema-build pass
//!
//! Declarations are plain serde data (they are usually read from a TOML
//! file). [`SchemaBuilder::build`] validates them once and resolves every
//! relationship into a [`RelationshipDefinition`], including its mirror
//! property on the opposite kind.

use crate::error::{Error, Result};
use crate::relationship::{Cardinality, Direction, RelationshipDefinition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Field names owned by the filter combinators
pub const RESERVED_FIELD_NAMES: [&str; 3] = ["and", "or", "not"];

/// Declared type of a scalar attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttributeType {
    String,
    Int,
    Float,
    Boolean,
    Id,
    /// A type name this crate does not know how to filter on
    Other(String),
}

impl AttributeType {
    pub fn name(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Id => "id",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for AttributeType {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "string" | "text" => Self::String,
            "int" | "integer" => Self::Int,
            "float" | "double" => Self::Float,
            "boolean" | "bool" => Self::Boolean,
            "id" => Self::Id,
            _ => Self::Other(s),
        }
    }
}

impl From<AttributeType> for String {
    fn from(t: AttributeType) -> Self {
        t.name().to_string()
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A scalar attribute on an entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: AttributeType,
}

/// A relationship field as declared on an entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDecl {
    /// Field name on the owning kind
    pub field: String,

    /// Kind of the related nodes
    pub kind: String,

    /// Edge label in the graph
    pub label: String,

    pub direction: Direction,

    #[serde(default)]
    pub cardinality: Cardinality,
}

/// Declaration of one entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKindDecl {
    pub name: String,

    #[serde(default)]
    pub attributes: Vec<AttributeDecl>,

    #[serde(default)]
    pub relationships: Vec<RelationshipDecl>,
}

impl EntityKindDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.attributes.push(AttributeDecl {
            name: name.into(),
            ty,
        });
        self
    }

    /// Declare a to-many relationship
    pub fn many(
        self,
        field: impl Into<String>,
        kind: impl Into<String>,
        label: impl Into<String>,
        direction: Direction,
    ) -> Self {
        self.relationship(field, kind, label, direction, Cardinality::Many)
    }

    /// Declare a to-one relationship
    pub fn one(
        self,
        field: impl Into<String>,
        kind: impl Into<String>,
        label: impl Into<String>,
        direction: Direction,
    ) -> Self {
        self.relationship(field, kind, label, direction, Cardinality::One)
    }

    fn relationship(
        mut self,
        field: impl Into<String>,
        kind: impl Into<String>,
        label: impl Into<String>,
        direction: Direction,
        cardinality: Cardinality,
    ) -> Self {
        self.relationships.push(RelationshipDecl {
            field: field.into(),
            kind: kind.into(),
            label: label.into(),
            direction,
            cardinality,
        });
        self
    }
}

/// A validated entity kind with resolved relationships
#[derive(Debug)]
pub struct EntityKind {
    name: String,
    attributes: Vec<AttributeDecl>,
    relationships: Vec<Arc<RelationshipDefinition>>,
}

impl EntityKind {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationships(&self) -> &[Arc<RelationshipDefinition>] {
        &self.relationships
    }

    pub fn relationship(&self, field: &str) -> Option<&Arc<RelationshipDefinition>> {
        self.relationships.iter().find(|r| r.field() == field)
    }
}

/// The full, validated schema
#[derive(Debug, Default)]
pub struct Schema {
    kinds: BTreeMap<String, Arc<EntityKind>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Build a schema from a list of declarations
    pub fn from_decls(decls: Vec<EntityKindDecl>) -> Result<Self> {
        SchemaBuilder { decls }.build()
    }

    pub fn kind(&self, name: &str) -> Option<&Arc<EntityKind>> {
        self.kinds.get(name)
    }

    pub fn require_kind(&self, name: &str) -> Result<&Arc<EntityKind>> {
        self.kind(name)
            .ok_or_else(|| Error::UnknownKind(name.to_string()))
    }

    /// Kinds in name order
    pub fn kinds(&self) -> impl Iterator<Item = &Arc<EntityKind>> {
        self.kinds.values()
    }

    pub fn relationship(&self, kind: &str, field: &str) -> Result<&Arc<RelationshipDefinition>> {
        self.require_kind(kind)?
            .relationship(field)
            .ok_or_else(|| Error::UnknownRelationship {
                kind: kind.to_string(),
                field: field.to_string(),
            })
    }
}

/// Collects declarations and validates them in one pass
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    decls: Vec<EntityKindDecl>,
}

impl SchemaBuilder {
    pub fn kind(mut self, decl: EntityKindDecl) -> Self {
        self.decls.push(decl);
        self
    }

    pub fn build(self) -> Result<Schema> {
        let mut names = HashSet::new();
        for decl in &self.decls {
            if !names.insert(decl.name.as_str()) {
                return Err(Error::DuplicateKind(decl.name.clone()));
            }
            Self::check_fields(decl)?;
        }

        for decl in &self.decls {
            for rel in &decl.relationships {
                if !names.contains(rel.kind.as_str()) {
                    return Err(Error::UnknownKind(rel.kind.clone()));
                }
            }
        }

        // (kind, label, direction) -> fields declaring it
        let mut mirrors: HashMap<(&str, &str, Direction), Vec<&str>> = HashMap::new();
        for decl in &self.decls {
            for rel in &decl.relationships {
                mirrors
                    .entry((decl.name.as_str(), rel.label.as_str(), rel.direction))
                    .or_default()
                    .push(rel.field.as_str());
            }
        }

        let mut kinds = BTreeMap::new();
        for decl in &self.decls {
            let mut relationships = Vec::with_capacity(decl.relationships.len());
            for rel in &decl.relationships {
                let candidates = mirrors
                    .get(&(rel.kind.as_str(), rel.label.as_str(), rel.direction.opposite()))
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                let remote_field = match candidates {
                    [] => None,
                    [field] => Some(field.to_string()),
                    _ => {
                        return Err(Error::AmbiguousMirror {
                            kind: decl.name.clone(),
                            field: rel.field.clone(),
                            related_kind: rel.kind.clone(),
                            label: rel.label.clone(),
                            candidates: candidates.iter().map(|c| c.to_string()).collect(),
                        })
                    }
                };

                relationships.push(Arc::new(RelationshipDefinition::new(
                    &decl.name,
                    rel,
                    remote_field,
                )));
            }

            kinds.insert(
                decl.name.clone(),
                Arc::new(EntityKind {
                    name: decl.name.clone(),
                    attributes: decl.attributes.clone(),
                    relationships,
                }),
            );
        }

        tracing::debug!("Built schema with {} kinds", kinds.len());
        Ok(Schema { kinds })
    }

    fn check_fields(decl: &EntityKindDecl) -> Result<()> {
        let mut fields = HashSet::new();
        let all = decl
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(decl.relationships.iter().map(|r| r.field.as_str()));

        for field in all {
            if RESERVED_FIELD_NAMES.contains(&field) {
                return Err(Error::ReservedFieldName {
                    kind: decl.name.clone(),
                    field: field.to_string(),
                });
            }
            if !fields.insert(field) {
                return Err(Error::DuplicateField {
                    kind: decl.name.clone(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> EntityKindDecl {
        EntityKindDecl::new("Tree")
            .attribute("name", AttributeType::String)
            .many("children", "Tree", "CHILD", Direction::Outgoing)
            .one("parent", "Tree", "CHILD", Direction::Incoming)
    }

    #[test]
    fn test_mirror_resolution() {
        let schema = Schema::builder().kind(tree()).build().unwrap();

        let children = schema.relationship("Tree", "children").unwrap();
        let parent = schema.relationship("Tree", "parent").unwrap();
        assert_eq!(children.remote_field(), Some("parent"));
        assert_eq!(parent.remote_field(), Some("children"));
    }

    #[test]
    fn test_no_mirror() {
        let schema = Schema::builder()
            .kind(EntityKindDecl::new("User").many("follows", "Tag", "FOLLOWS", Direction::Outgoing))
            .kind(EntityKindDecl::new("Tag"))
            .build()
            .unwrap();

        assert_eq!(schema.relationship("User", "follows").unwrap().remote_field(), None);
    }

    #[test]
    fn test_ambiguous_mirror_fails() {
        let err = Schema::builder()
            .kind(EntityKindDecl::new("Issue").many("labels", "Label", "LABELED", Direction::Outgoing))
            .kind(
                EntityKindDecl::new("Label")
                    .many("issues", "Issue", "LABELED", Direction::Incoming)
                    .many("openIssues", "Issue", "LABELED", Direction::Incoming),
            )
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::AmbiguousMirror { ref field, .. } if field == "labels"));
    }

    #[test]
    fn test_unknown_related_kind() {
        let err = Schema::builder()
            .kind(EntityKindDecl::new("User").many("posts", "Post", "WROTE", Direction::Outgoing))
            .build()
            .unwrap_err();
        assert_eq!(err, Error::UnknownKind("Post".to_string()));
    }

    #[test]
    fn test_duplicate_and_reserved_fields() {
        let err = Schema::builder()
            .kind(
                EntityKindDecl::new("User")
                    .attribute("name", AttributeType::String)
                    .attribute("name", AttributeType::Int),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateField { .. }));

        let err = Schema::builder()
            .kind(EntityKindDecl::new("User").attribute("and", AttributeType::String))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ReservedFieldName { .. }));

        let err = Schema::builder()
            .kind(EntityKindDecl::new("User"))
            .kind(EntityKindDecl::new("User"))
            .build()
            .unwrap_err();
        assert_eq!(err, Error::DuplicateKind("User".to_string()));
    }

    #[test]
    fn test_decls_from_toml() {
        #[derive(Deserialize)]
        struct File {
            kinds: Vec<EntityKindDecl>,
        }

        let file: File = toml::from_str(
            r#"
            [[kinds]]
            name = "Tree"
            attributes = [{ name = "name", type = "string" }]
            relationships = [
                { field = "children", kind = "Tree", label = "CHILD", direction = "outgoing" },
                { field = "parent", kind = "Tree", label = "CHILD", direction = "INCOMING", cardinality = "one" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(file.kinds[0], tree());
    }

    #[test]
    fn test_attribute_type_names() {
        assert_eq!(AttributeType::from("Integer".to_string()), AttributeType::Int);
        assert_eq!(
            AttributeType::from("geo".to_string()),
            AttributeType::Other("geo".to_string())
        );
    }
}
