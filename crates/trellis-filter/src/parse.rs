//! Parsing raw filter literals into typed filters

use serde_json::{Map, Value as JsonValue};
use trellis_core::{AttributeType, Quantifier, Value};

use crate::definition::{FieldFilterDefinition, FilterDefinition, FilterField, FilterSchema, SubFilterDefinition};
use crate::entry::{FilterEntry, NodeFilter, QuantifiedFilterEntry, ScalarFilterEntry, ScalarPredicate};
use crate::error::{FilterError, FilterResult};
use crate::operator::ScalarOperator;

/// Segment of the path to the value being parsed
enum Segment {
    Field(String),
    Index(usize),
}

/// Recursive-descent parser over `serde_json` values
///
/// Tracks the field path so errors can point at the offending input.
pub(crate) struct Parser<'a> {
    filters: &'a FilterSchema,
    path: Vec<Segment>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(filters: &'a FilterSchema) -> Self {
        Self {
            filters,
            path: Vec::new(),
        }
    }

    pub(crate) fn node_filter(
        &mut self,
        definition: &FilterDefinition,
        input: &JsonValue,
    ) -> FilterResult<NodeFilter> {
        let object = self.object(input, "filter object")?;
        let mut entries = Vec::with_capacity(object.len());

        for (key, value) in object {
            self.path.push(Segment::Field(key.clone()));
            match key.as_str() {
                "and" => entries.push(FilterEntry::And(self.filter_list(definition, value)?)),
                "or" => entries.push(FilterEntry::Or(self.filter_list(definition, value)?)),
                "not" => entries.push(FilterEntry::Not(Box::new(
                    self.single_filter(definition, value)?,
                ))),
                _ => match definition.field(key) {
                    Some(FilterField::Scalar(field)) => {
                        entries.push(FilterEntry::Scalar(self.scalar(field, value)?))
                    }
                    Some(FilterField::Relationship(sub)) => {
                        self.quantifiers(sub, value, &mut entries)?
                    }
                    None => return Err(self.unknown_field(key, definition.type_name())),
                },
            }
            self.path.pop();
        }

        Ok(NodeFilter { entries })
    }

    fn filter_list(
        &mut self,
        definition: &FilterDefinition,
        value: &JsonValue,
    ) -> FilterResult<Vec<NodeFilter>> {
        let items = value
            .as_array()
            .ok_or_else(|| self.invalid("list of filter objects", value))?;

        let mut filters = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            self.path.push(Segment::Index(i));
            filters.push(self.node_filter(definition, item)?);
            self.path.pop();
        }
        Ok(filters)
    }

    /// `not` takes an object or a list holding exactly one object
    fn single_filter(
        &mut self,
        definition: &FilterDefinition,
        value: &JsonValue,
    ) -> FilterResult<NodeFilter> {
        match value {
            JsonValue::Array(items) if items.len() == 1 => {
                self.path.push(Segment::Index(0));
                let filter = self.node_filter(definition, &items[0])?;
                self.path.pop();
                Ok(filter)
            }
            JsonValue::Object(_) => self.node_filter(definition, value),
            _ => Err(self.invalid("filter object or single-element list", value)),
        }
    }

    fn quantifiers(
        &mut self,
        sub: &SubFilterDefinition,
        value: &JsonValue,
        entries: &mut Vec<FilterEntry>,
    ) -> FilterResult<()> {
        let filters = self.filters;
        let object = self.object(value, "object with all, some or none")?;

        for (key, nested) in object {
            self.path.push(Segment::Field(key.clone()));
            let quantifier = Quantifier::from_name(key)
                .ok_or_else(|| self.unknown_field(key, sub.type_name()))?;
            let definition = filters.definition(sub.related_kind())?;
            let filter = self.node_filter(definition, nested)?;
            entries.push(FilterEntry::Quantified(QuantifiedFilterEntry {
                quantifier,
                relationship: sub.relationship().clone(),
                filter,
            }));
            self.path.pop();
        }
        Ok(())
    }

    fn scalar(
        &mut self,
        field: &FieldFilterDefinition,
        value: &JsonValue,
    ) -> FilterResult<ScalarFilterEntry> {
        let object = self.object(value, "object of operators")?;
        let mut predicates = Vec::with_capacity(object.len());

        for (key, literal) in object {
            self.path.push(Segment::Field(key.clone()));
            let operator = ScalarOperator::from_name(key)
                .filter(|op| field.supports(*op))
                .ok_or_else(|| self.unknown_field(key, field.type_name()))?;

            let predicate = match operator.compare_op() {
                Some(op) => ScalarPredicate::Compare {
                    op,
                    value: self.literal(field.attribute_type(), literal)?,
                },
                None if operator == ScalarOperator::In => {
                    ScalarPredicate::In(self.literal_list(field.attribute_type(), literal)?)
                }
                None => ScalarPredicate::IsNull(
                    literal
                        .as_bool()
                        .ok_or_else(|| self.invalid("boolean", literal))?,
                ),
            };
            predicates.push(predicate);
            self.path.pop();
        }

        Ok(ScalarFilterEntry {
            attribute: field.name().to_string(),
            predicates,
        })
    }

    fn literal_list(&mut self, ty: &AttributeType, value: &JsonValue) -> FilterResult<Vec<Value>> {
        let items = value
            .as_array()
            .ok_or_else(|| self.invalid(&format!("list of {}", ty), value))?;

        let mut values = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            self.path.push(Segment::Index(i));
            values.push(self.literal(ty, item)?);
            self.path.pop();
        }
        Ok(values)
    }

    fn literal(&self, ty: &AttributeType, value: &JsonValue) -> FilterResult<Value> {
        let parsed = match (ty, value) {
            (AttributeType::String | AttributeType::Id, JsonValue::String(s)) => {
                Some(Value::String(s.clone()))
            }
            (AttributeType::Int, JsonValue::Number(n)) => n.as_i64().map(Value::Int),
            (AttributeType::Float, JsonValue::Number(n)) => n.as_f64().map(Value::Float),
            (AttributeType::Boolean, JsonValue::Bool(b)) => Some(Value::Bool(*b)),
            _ => None,
        };
        parsed.ok_or_else(|| self.invalid(ty.name(), value))
    }

    fn object<'v>(&self, value: &'v JsonValue, expected: &str) -> FilterResult<&'v Map<String, JsonValue>> {
        value.as_object().ok_or_else(|| self.invalid(expected, value))
    }

    fn unknown_field(&self, field: &str, definition: String) -> FilterError {
        FilterError::UnknownFilterField {
            field: field.to_string(),
            definition,
            path: self.path_string(),
        }
    }

    fn invalid(&self, expected: &str, found: &JsonValue) -> FilterError {
        FilterError::InvalidFilterValue {
            path: self.path_string(),
            expected: expected.to_string(),
            found: json_type(found).to_string(),
        }
    }

    fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "<root>".to_string();
        }
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                Segment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Segment::Index(i) => out.push_str(&format!("[{}]", i)),
            }
        }
        out
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "int",
        JsonValue::Number(_) => "float",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConditionGenerator;
    use serde_json::json;
    use trellis_core::{CompareOp, Direction, EntityKindDecl, Schema, Variable};

    fn filters() -> FilterSchema {
        let schema = Schema::builder()
            .kind(
                EntityKindDecl::new("Tree")
                    .attribute("name", AttributeType::String)
                    .attribute("height", AttributeType::Float)
                    .attribute("rings", AttributeType::Int)
                    .attribute("evergreen", AttributeType::Boolean)
                    .many("children", "Tree", "CHILD", Direction::Outgoing)
                    .one("parent", "Tree", "CHILD", Direction::Incoming),
            )
            .build()
            .unwrap();
        FilterSchema::build(&schema).unwrap()
    }

    #[test]
    fn test_parse_mirrors_input_keys() {
        let filter = filters()
            .parse(
                "Tree",
                &json!({
                    "name": { "startsWith": "o", "notEquals": "oak" },
                    "children": { "all": { "rings": { "gt": 3 } }, "none": {} },
                    "or": [ { "evergreen": { "equals": true } }, { "height": { "lt": 2 } } ]
                }),
            )
            .unwrap();

        let entries = &filter.root().entries;
        assert_eq!(entries.len(), 4);
        assert!(matches!(
            &entries[0],
            FilterEntry::Quantified(q) if q.quantifier == Quantifier::All
        ));
        assert!(matches!(
            &entries[1],
            FilterEntry::Quantified(q) if q.quantifier == Quantifier::None && q.filter.entries.is_empty()
        ));
        match &entries[2] {
            FilterEntry::Scalar(scalar) => {
                assert_eq!(scalar.attribute, "name");
                assert_eq!(scalar.predicates.len(), 2);
            }
            other => panic!("expected scalar entry, got {:?}", other),
        }
        assert!(matches!(&entries[3], FilterEntry::Or(filters) if filters.len() == 2));
    }

    #[test]
    fn test_int_literal_for_float_attribute() {
        let filter = filters()
            .parse("Tree", &json!({ "height": { "gte": 2 } }))
            .unwrap();

        match &filter.root().entries[0] {
            FilterEntry::Scalar(scalar) => assert_eq!(
                scalar.predicates[0],
                ScalarPredicate::Compare {
                    op: CompareOp::Gte,
                    value: Value::Float(2.0)
                }
            ),
            other => panic!("expected scalar entry, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field() {
        let err = filters()
            .parse("Tree", &json!({ "and": [ {}, { "age": { "equals": 1 } } ] }))
            .unwrap_err();

        assert_eq!(
            err,
            FilterError::UnknownFilterField {
                field: "age".to_string(),
                definition: "TreeFilterInput".to_string(),
                path: "and[1].age".to_string(),
            }
        );
    }

    #[test]
    fn test_unsupported_operator_is_unknown_field() {
        let err = filters()
            .parse("Tree", &json!({ "rings": { "contains": "1" } }))
            .unwrap_err();

        assert!(matches!(
            err,
            FilterError::UnknownFilterField { ref definition, ref path, .. }
                if definition == "IntFilterInput" && path == "rings.contains"
        ));
    }

    #[test]
    fn test_unknown_quantifier() {
        let err = filters()
            .parse("Tree", &json!({ "children": { "any": {} } }))
            .unwrap_err();

        assert!(matches!(
            err,
            FilterError::UnknownFilterField { ref field, ref definition, .. }
                if field == "any" && definition == "TreeListFilterInput"
        ));
    }

    #[test]
    fn test_invalid_values() {
        let filters = filters();
        let cases = [
            (json!({ "rings": { "equals": "three" } }), "rings.equals", "int"),
            (json!({ "rings": { "equals": 1.5 } }), "rings.equals", "int"),
            (json!({ "name": { "in": ["a", 1] } }), "name.in[1]", "string"),
            (json!({ "name": { "isNull": "yes" } }), "name.isNull", "boolean"),
            (json!({ "name": "oak" }), "name", "object of operators"),
            (json!({ "and": {} }), "and", "list of filter objects"),
            (json!({ "not": [{}, {}] }), "not", "filter object or single-element list"),
            (json!([]), "<root>", "filter object"),
        ];

        for (input, path, expected) in cases {
            match filters.parse("Tree", &input) {
                Err(FilterError::InvalidFilterValue {
                    path: p,
                    expected: e,
                    ..
                }) => {
                    assert_eq!(p, path, "input {}", input);
                    assert_eq!(e, expected, "input {}", input);
                }
                other => panic!("expected invalid value for {}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_not_accepts_singleton_list() {
        let filters = filters();
        let n = Variable::new("n");
        let as_object = filters
            .parse("Tree", &json!({ "not": { "name": { "equals": "oak" } } }))
            .unwrap();
        let as_list = filters
            .parse("Tree", &json!({ "not": [ { "name": { "equals": "oak" } } ] }))
            .unwrap();

        assert_eq!(as_object, as_list);
        assert_eq!(
            as_object.generate_condition(&n).to_string(),
            "NOT (n.name = 'oak')"
        );
    }

    #[test]
    fn test_null_literal_is_rejected() {
        let err = filters()
            .parse("Tree", &json!({ "name": { "equals": null } }))
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidFilterValue { ref found, .. } if found == "null"));
    }
}
