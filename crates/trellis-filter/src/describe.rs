//! Introspection of filter definitions

use serde::Serialize;

use crate::definition::{FilterDefinition, FilterField, FilterSchema, COMBINATORS};
use crate::error::FilterResult;

/// Serializable summary of one kind's filter fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterDescription {
    pub kind: String,
    pub type_name: String,
    pub combinators: Vec<String>,
    pub fields: Vec<FieldDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field_type", rename_all = "snake_case")]
pub enum FieldDescription {
    Scalar {
        name: String,
        #[serde(rename = "type")]
        ty: String,
        type_name: String,
        operators: Vec<String>,
    },
    Relationship {
        name: String,
        related_kind: String,
        type_name: String,
        description: String,
        quantifiers: Vec<QuantifierDescription>,
    },
}

impl FieldDescription {
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar { name, .. } | Self::Relationship { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantifierDescription {
    pub name: String,
    pub description: String,
}

impl From<&FilterDefinition> for FilterDescription {
    fn from(definition: &FilterDefinition) -> Self {
        let fields = definition
            .fields()
            .map(|(name, field)| match field {
                FilterField::Scalar(scalar) => FieldDescription::Scalar {
                    name: name.to_string(),
                    ty: scalar.attribute_type().name().to_string(),
                    type_name: scalar.type_name(),
                    operators: scalar.operators().iter().map(|op| op.name().to_string()).collect(),
                },
                FilterField::Relationship(sub) => FieldDescription::Relationship {
                    name: name.to_string(),
                    related_kind: sub.related_kind().to_string(),
                    type_name: sub.type_name(),
                    description: sub.description(),
                    quantifiers: sub
                        .quantifiers()
                        .iter()
                        .map(|q| QuantifierDescription {
                            name: q.name().to_string(),
                            description: q.description().to_string(),
                        })
                        .collect(),
                },
            })
            .collect();

        Self {
            kind: definition.kind().to_string(),
            type_name: definition.type_name(),
            combinators: COMBINATORS.iter().map(|c| c.to_string()).collect(),
            fields,
        }
    }
}

impl FilterSchema {
    pub fn describe(&self, kind: &str) -> FilterResult<FilterDescription> {
        Ok(FilterDescription::from(self.definition(kind)?.as_ref()))
    }

    /// Descriptions of every kind, in kind name order
    pub fn describe_all(&self) -> Vec<FilterDescription> {
        self.definitions()
            .map(|definition| FilterDescription::from(definition.as_ref()))
            .collect()
    }
}
