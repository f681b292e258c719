//! Filter definitions: which filter fields exist for each entity kind
//!
//! Definitions are built once per schema by [`FilterSchema::build`] and are
//! read-only afterwards. Relationship sub-filters reference the definition
//! of the related kind by name, which keeps cyclic schemas (a kind filtered
//! through a relationship back to itself) finite.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::Value as JsonValue;
use trellis_core::{AttributeType, Quantifier, RelationshipDefinition, Schema};

use crate::entry::Filter;
use crate::error::{FilterError, FilterResult};
use crate::operator::{operators_for, ScalarOperator};
use crate::parse::Parser;

/// Names of the logical combinators available on every node filter
pub const COMBINATORS: [&str; 3] = ["and", "or", "not"];

/// Filter on one scalar attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilterDefinition {
    name: String,
    ty: AttributeType,
    operators: &'static [ScalarOperator],
}

impl FieldFilterDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_type(&self) -> &AttributeType {
        &self.ty
    }

    pub fn operators(&self) -> &'static [ScalarOperator] {
        self.operators
    }

    pub fn supports(&self, operator: ScalarOperator) -> bool {
        self.operators.contains(&operator)
    }

    /// Name of the operator block, e.g. `StringFilterInput`
    pub fn type_name(&self) -> String {
        format!("{}FilterInput", capitalize(self.ty.name()))
    }
}

/// Quantifier block of a relationship field (`all`, `some`, `none`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFilterDefinition {
    name: String,
    relationship: Arc<RelationshipDefinition>,
}

impl SubFilterDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relationship(&self) -> &Arc<RelationshipDefinition> {
        &self.relationship
    }

    /// Kind whose definition the quantifiers nest
    pub fn related_kind(&self) -> &str {
        self.relationship.related_kind()
    }

    pub fn quantifiers(&self) -> [Quantifier; 3] {
        Quantifier::ALL
    }

    pub fn description(&self) -> String {
        format!(
            "Filters {} nodes related through {}",
            self.related_kind(),
            self.name
        )
    }

    /// e.g. `TreeListFilterInput`
    pub fn type_name(&self) -> String {
        format!("{}ListFilterInput", self.related_kind())
    }
}

/// One named entry of a [`FilterDefinition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterField {
    Scalar(FieldFilterDefinition),
    Relationship(SubFilterDefinition),
}

/// All filter fields of one entity kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDefinition {
    kind: String,
    fields: BTreeMap<String, FilterField>,
}

impl FilterDefinition {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn field(&self, name: &str) -> Option<&FilterField> {
        self.fields.get(name)
    }

    /// Fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FilterField)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// e.g. `TreeFilterInput`
    pub fn type_name(&self) -> String {
        format!("{}FilterInput", self.kind)
    }

    /// Parse a raw filter literal against this definition
    ///
    /// `filters` resolves the definitions nested under relationship fields.
    pub fn parse(&self, filters: &FilterSchema, input: &JsonValue) -> FilterResult<Filter> {
        let root = Parser::new(filters).node_filter(self, input)?;
        tracing::debug!("Parsed {} filter with {} entries", self.kind, root.entries.len());
        Ok(Filter::new(self.kind.clone(), root))
    }
}

/// Filter definitions for every kind of a schema
#[derive(Debug, Default)]
pub struct FilterSchema {
    definitions: BTreeMap<String, Arc<FilterDefinition>>,
}

impl FilterSchema {
    /// Build the definitions of every kind
    ///
    /// Fails if an attribute type has no operator set or the schema is
    /// inconsistent. Meant to run once at startup.
    pub fn build(schema: &Schema) -> FilterResult<Self> {
        let mut builder = DefinitionBuilder {
            schema,
            in_progress: HashSet::new(),
            built: BTreeMap::new(),
        };
        for kind in schema.kinds() {
            builder.ensure(kind.name())?;
        }

        tracing::debug!("Built filter definitions for {} kinds", builder.built.len());
        Ok(Self {
            definitions: builder.built,
        })
    }

    pub fn definition(&self, kind: &str) -> FilterResult<&Arc<FilterDefinition>> {
        self.definitions
            .get(kind)
            .ok_or_else(|| FilterError::UnknownKind(kind.to_string()))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<FilterDefinition>> {
        self.definitions.values()
    }

    /// Parse a raw filter literal for `kind`
    pub fn parse(&self, kind: &str, input: &JsonValue) -> FilterResult<Filter> {
        self.definition(kind)?.parse(self, input)
    }
}

/// Memoized construction keyed by kind
struct DefinitionBuilder<'a> {
    schema: &'a Schema,
    in_progress: HashSet<String>,
    built: BTreeMap<String, Arc<FilterDefinition>>,
}

impl DefinitionBuilder<'_> {
    fn ensure(&mut self, kind: &str) -> FilterResult<()> {
        // Already built, or under construction higher up the stack: the
        // sub-filter only needs the kind name as a forward reference.
        if self.built.contains_key(kind) || !self.in_progress.insert(kind.to_string()) {
            return Ok(());
        }

        let entity = self.schema.require_kind(kind)?;
        let mut fields = BTreeMap::new();

        for attribute in entity.attributes() {
            let operators =
                operators_for(&attribute.ty).ok_or_else(|| FilterError::UnmappedAttributeType {
                    kind: kind.to_string(),
                    attribute: attribute.name.clone(),
                    ty: attribute.ty.name().to_string(),
                })?;
            fields.insert(
                attribute.name.clone(),
                FilterField::Scalar(FieldFilterDefinition {
                    name: attribute.name.clone(),
                    ty: attribute.ty.clone(),
                    operators,
                }),
            );
        }

        for relationship in entity.relationships() {
            self.ensure(relationship.related_kind())?;
            fields.insert(
                relationship.field().to_string(),
                FilterField::Relationship(SubFilterDefinition {
                    name: relationship.field().to_string(),
                    relationship: relationship.clone(),
                }),
            );
        }

        self.in_progress.remove(kind);
        self.built.insert(
            kind.to_string(),
            Arc::new(FilterDefinition {
                kind: kind.to_string(),
                fields,
            }),
        );
        Ok(())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Direction, EntityKindDecl};

    fn cyclic_schema() -> Schema {
        Schema::builder()
            .kind(
                EntityKindDecl::new("User")
                    .attribute("name", AttributeType::String)
                    .many("posts", "Post", "WROTE", Direction::Outgoing),
            )
            .kind(
                EntityKindDecl::new("Post")
                    .attribute("likes", AttributeType::Int)
                    .one("author", "User", "WROTE", Direction::Incoming)
                    .many("replies", "Post", "REPLY", Direction::Outgoing),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_cyclic_schema() {
        let filters = FilterSchema::build(&cyclic_schema()).unwrap();

        let user = filters.definition("User").unwrap();
        match user.field("posts") {
            Some(FilterField::Relationship(sub)) => {
                assert_eq!(sub.related_kind(), "Post");
                assert_eq!(sub.type_name(), "PostListFilterInput");
            }
            other => panic!("expected relationship field, got {:?}", other),
        }

        let post = filters.definition("Post").unwrap();
        assert!(matches!(post.field("replies"), Some(FilterField::Relationship(_))));
        match post.field("likes") {
            Some(FilterField::Scalar(field)) => {
                assert!(field.supports(ScalarOperator::Gt));
                assert_eq!(field.type_name(), "IntFilterInput");
            }
            other => panic!("expected scalar field, got {:?}", other),
        }
    }

    #[test]
    fn test_unmapped_attribute_type_fails() {
        let schema = Schema::builder()
            .kind(EntityKindDecl::new("Place").attribute("location", AttributeType::Other("point".into())))
            .build()
            .unwrap();

        let err = FilterSchema::build(&schema).unwrap_err();
        assert_eq!(
            err,
            FilterError::UnmappedAttributeType {
                kind: "Place".to_string(),
                attribute: "location".to_string(),
                ty: "point".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_kind() {
        let filters = FilterSchema::build(&cyclic_schema()).unwrap();
        assert_eq!(
            filters.definition("Comment").unwrap_err(),
            FilterError::UnknownKind("Comment".to_string())
        );
    }
}
