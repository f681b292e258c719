//! Parsed filters and condition generation

use std::sync::Arc;

use trellis_core::{
    CompareOp, Condition, Quantifier, RelationshipDefinition, Value, Variable, VariableGenerator,
};

/// Anything that can emit a condition against a pattern variable
pub trait ConditionGenerator {
    fn generate_condition(&self, variable: &Variable) -> Condition;
}

/// A parsed top-level filter for one entity kind
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    kind: String,
    root: NodeFilter,
}

impl Filter {
    pub(crate) fn new(kind: String, root: NodeFilter) -> Self {
        Self { kind, root }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn root(&self) -> &NodeFilter {
        &self.root
    }
}

impl ConditionGenerator for Filter {
    fn generate_condition(&self, variable: &Variable) -> Condition {
        self.root.generate_condition(variable)
    }
}

/// One filter object; its entries are joined by AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFilter {
    pub entries: Vec<FilterEntry>,
}

impl NodeFilter {
    fn condition(&self, variable: &Variable, names: &mut VariableGenerator) -> Condition {
        Condition::all_of(self.entries.iter().map(|e| e.condition(variable, names)))
    }
}

impl ConditionGenerator for NodeFilter {
    fn generate_condition(&self, variable: &Variable) -> Condition {
        self.condition(variable, &mut VariableGenerator::new(variable))
    }
}

/// One entry of a filter object
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEntry {
    Scalar(ScalarFilterEntry),
    And(Vec<NodeFilter>),
    Or(Vec<NodeFilter>),
    Not(Box<NodeFilter>),
    Quantified(QuantifiedFilterEntry),
}

impl FilterEntry {
    fn condition(&self, variable: &Variable, names: &mut VariableGenerator) -> Condition {
        match self {
            Self::Scalar(entry) => entry.condition(variable),
            Self::And(filters) => {
                Condition::all_of(filters.iter().map(|f| f.condition(variable, names)))
            }
            Self::Or(filters) => {
                Condition::any_of(filters.iter().map(|f| f.condition(variable, names)))
            }
            Self::Not(filter) => Condition::negate(filter.condition(variable, names)),
            Self::Quantified(entry) => {
                let related = names.fresh();
                let pattern = entry.relationship.generate_relationship(variable, &related);
                let predicate = entry.filter.condition(&related, names);
                Condition::Quantified {
                    quantifier: entry.quantifier,
                    pattern,
                    predicate: Box::new(predicate),
                }
            }
        }
    }
}

impl ConditionGenerator for FilterEntry {
    fn generate_condition(&self, variable: &Variable) -> Condition {
        self.condition(variable, &mut VariableGenerator::new(variable))
    }
}

/// Operators applied to one scalar attribute, joined by AND
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFilterEntry {
    pub attribute: String,
    pub predicates: Vec<ScalarPredicate>,
}

impl ScalarFilterEntry {
    fn condition(&self, variable: &Variable) -> Condition {
        Condition::all_of(self.predicates.iter().map(|p| p.condition(variable, &self.attribute)))
    }
}

/// A typed operator literal
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarPredicate {
    Compare { op: CompareOp, value: Value },
    In(Vec<Value>),
    IsNull(bool),
}

impl ScalarPredicate {
    fn condition(&self, variable: &Variable, attribute: &str) -> Condition {
        match self {
            Self::Compare { op, value } => Condition::Compare {
                variable: variable.clone(),
                attribute: attribute.to_string(),
                op: *op,
                value: value.clone(),
            },
            Self::In(values) => Condition::In {
                variable: variable.clone(),
                attribute: attribute.to_string(),
                values: values.clone(),
            },
            Self::IsNull(is_null) => {
                let condition = Condition::IsNull {
                    variable: variable.clone(),
                    attribute: attribute.to_string(),
                };
                if *is_null {
                    condition
                } else {
                    Condition::negate(condition)
                }
            }
        }
    }
}

/// `all`, `some` or `none` over the nodes of one relationship
#[derive(Debug, Clone, PartialEq)]
pub struct QuantifiedFilterEntry {
    pub quantifier: Quantifier,
    pub relationship: Arc<RelationshipDefinition>,
    pub filter: NodeFilter,
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Direction, EntityKindDecl, Schema};

    fn children() -> Arc<RelationshipDefinition> {
        let schema = Schema::builder()
            .kind(EntityKindDecl::new("Tree").many("children", "Tree", "CHILD", Direction::Outgoing))
            .build()
            .unwrap();
        schema.relationship("Tree", "children").unwrap().clone()
    }

    fn name_equals(value: &str) -> FilterEntry {
        FilterEntry::Scalar(ScalarFilterEntry {
            attribute: "name".to_string(),
            predicates: vec![ScalarPredicate::Compare {
                op: CompareOp::Eq,
                value: Value::from(value),
            }],
        })
    }

    fn some_child(filter: NodeFilter) -> FilterEntry {
        FilterEntry::Quantified(QuantifiedFilterEntry {
            quantifier: Quantifier::Some,
            relationship: children(),
            filter,
        })
    }

    #[test]
    fn test_empty_combinators() {
        let n = Variable::new("n");
        assert_eq!(FilterEntry::And(vec![]).generate_condition(&n), Condition::True);
        assert_eq!(FilterEntry::Or(vec![]).generate_condition(&n), Condition::False);
        assert_eq!(NodeFilter::default().generate_condition(&n), Condition::True);
    }

    #[test]
    fn test_nested_quantifiers_get_distinct_variables() {
        let inner = NodeFilter {
            entries: vec![some_child(NodeFilter {
                entries: vec![name_equals("leaf")],
            })],
        };
        let filter = NodeFilter {
            entries: vec![some_child(inner), some_child(NodeFilter::default())],
        };

        let rendered = filter.generate_condition(&Variable::new("n")).to_string();
        assert_eq!(
            rendered,
            "(any(n_r0 IN [(n)-[:CHILD]->(n_r0) | n_r0] WHERE \
             any(n_r1 IN [(n_r0)-[:CHILD]->(n_r1) | n_r1] WHERE n_r1.name = 'leaf')) \
             AND any(n_r2 IN [(n)-[:CHILD]->(n_r2) | n_r2] WHERE true))"
        );
    }

    #[test]
    fn test_generation_is_deterministic() {
        let filter = NodeFilter {
            entries: vec![name_equals("a"), some_child(NodeFilter::default())],
        };
        let n = Variable::new("n");
        assert_eq!(filter.generate_condition(&n), filter.generate_condition(&n));

        let m = filter.generate_condition(&Variable::new("m")).to_string();
        assert!(m.starts_with("(m.name = 'a' AND any(m_r0 IN [(m)-[:CHILD]->(m_r0)"));
    }

    #[test]
    fn test_is_null_false_negates() {
        let predicate = ScalarPredicate::IsNull(false);
        assert_eq!(
            predicate.condition(&Variable::new("n"), "name").to_string(),
            "NOT (n.name IS NULL)"
        );
    }
}
