//! Condition evaluation against the in-memory graph
//!
//! Comparisons involving a missing or null attribute are false, as are
//! conditions on unbound variables.

use std::cmp::Ordering;
use std::collections::HashMap;

use trellis_core::{CompareOp, Condition, Quantifier, Value, Variable};

use crate::memory::GraphState;

static NULL: Value = Value::Null;

pub(crate) struct Evaluator<'a> {
    graph: &'a GraphState,
    bindings: HashMap<Variable, &'a str>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(graph: &'a GraphState, variable: &Variable, id: &'a str) -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(variable.clone(), id);
        Self { graph, bindings }
    }

    pub(crate) fn matches(&mut self, condition: &Condition) -> bool {
        match condition {
            Condition::True => true,
            Condition::False => false,
            Condition::Compare {
                variable,
                attribute,
                op,
                value,
            } => compare(self.attribute(variable, attribute), *op, value),
            Condition::In {
                variable,
                attribute,
                values,
            } => {
                let actual = self.attribute(variable, attribute);
                values.iter().any(|v| actual.loose_eq(v))
            }
            Condition::IsNull {
                variable,
                attribute,
            } => self.attribute(variable, attribute).is_null(),
            Condition::And(conditions) => conditions.iter().all(|c| self.matches(c)),
            Condition::Or(conditions) => conditions.iter().any(|c| self.matches(c)),
            Condition::Not(condition) => !self.matches(condition),
            Condition::Quantified {
                quantifier,
                pattern,
                predicate,
            } => {
                let Some(root) = self.bindings.get(&pattern.root).copied() else {
                    tracing::warn!("Unbound variable {} in pattern {}", pattern.root, pattern);
                    return false;
                };

                let graph = self.graph;
                let mut results = Vec::new();
                for related in graph.neighbors(root, &pattern.label, pattern.direction) {
                    self.bindings.insert(pattern.related.clone(), related);
                    results.push(self.matches(predicate));
                }
                self.bindings.remove(&pattern.related);

                match quantifier {
                    Quantifier::All => results.iter().all(|m| *m),
                    Quantifier::Some => results.iter().any(|m| *m),
                    Quantifier::None => !results.iter().any(|m| *m),
                }
            }
        }
    }

    fn attribute(&self, variable: &Variable, attribute: &str) -> &'a Value {
        let graph = self.graph;
        self.bindings
            .get(variable)
            .and_then(|id| graph.nodes.get(*id))
            .and_then(|node| node.attributes.get(attribute))
            .unwrap_or(&NULL)
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    if actual.is_null() || expected.is_null() {
        return false;
    }
    let strings = || actual.as_str().zip(expected.as_str());

    match op {
        CompareOp::Eq => actual.loose_eq(expected),
        CompareOp::Neq => !actual.loose_eq(expected),
        CompareOp::Lt => actual.compare(expected) == Some(Ordering::Less),
        CompareOp::Lte => matches!(
            actual.compare(expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => actual.compare(expected) == Some(Ordering::Greater),
        CompareOp::Gte => matches!(
            actual.compare(expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Contains => strings().is_some_and(|(a, e)| a.contains(e)),
        CompareOp::StartsWith => strings().is_some_and(|(a, e)| a.starts_with(e)),
        CompareOp::EndsWith => strings().is_some_and(|(a, e)| a.ends_with(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{StoredEdge, StoredNode};
    use trellis_core::{Direction, EdgePattern};

    fn graph() -> GraphState {
        let mut graph = GraphState::default();
        for (id, name) in [("root", "oak"), ("a", "acorn"), ("b", "bud")] {
            graph.nodes.insert(
                id.to_string(),
                StoredNode {
                    kind: "Tree".to_string(),
                    attributes: [("name".to_string(), Value::from(name))].into_iter().collect(),
                },
            );
        }
        for child in ["a", "b"] {
            graph.edges.insert(StoredEdge {
                from: "root".to_string(),
                label: "CHILD".to_string(),
                to: child.to_string(),
            });
        }
        graph
    }

    fn quantified(quantifier: Quantifier, direction: Direction, predicate: Condition) -> Condition {
        Condition::Quantified {
            quantifier,
            pattern: EdgePattern {
                root: Variable::new("n"),
                related: Variable::new("n_r0"),
                label: "CHILD".to_string(),
                direction,
            },
            predicate: Box::new(predicate),
        }
    }

    fn name(op: CompareOp, value: &str) -> Condition {
        Condition::Compare {
            variable: Variable::new("n_r0"),
            attribute: "name".to_string(),
            op,
            value: Value::from(value),
        }
    }

    #[test]
    fn test_quantifiers_over_children() {
        let graph = graph();
        let n = Variable::new("n");
        let mut eval = Evaluator::new(&graph, &n, "root");

        let starts_with_a = name(CompareOp::StartsWith, "a");
        assert!(eval.matches(&quantified(Quantifier::Some, Direction::Outgoing, starts_with_a.clone())));
        assert!(!eval.matches(&quantified(Quantifier::All, Direction::Outgoing, starts_with_a.clone())));
        assert!(!eval.matches(&quantified(Quantifier::None, Direction::Outgoing, starts_with_a)));

        let any_name = Condition::negate(Condition::IsNull {
            variable: Variable::new("n_r0"),
            attribute: "name".to_string(),
        });
        assert!(eval.matches(&quantified(Quantifier::All, Direction::Outgoing, any_name)));
    }

    #[test]
    fn test_quantifiers_over_no_related_nodes() {
        let graph = graph();
        let n = Variable::new("n");
        let mut eval = Evaluator::new(&graph, &n, "a");

        assert!(eval.matches(&quantified(Quantifier::All, Direction::Outgoing, Condition::False)));
        assert!(eval.matches(&quantified(Quantifier::None, Direction::Outgoing, Condition::True)));
        assert!(!eval.matches(&quantified(Quantifier::Some, Direction::Outgoing, Condition::True)));
    }

    #[test]
    fn test_incoming_direction() {
        let graph = graph();
        let n = Variable::new("n");
        let mut eval = Evaluator::new(&graph, &n, "a");

        assert!(eval.matches(&quantified(
            Quantifier::Some,
            Direction::Incoming,
            name(CompareOp::Eq, "oak")
        )));
    }

    #[test]
    fn test_null_comparisons_are_false() {
        let graph = graph();
        let n = Variable::new("n");
        let mut eval = Evaluator::new(&graph, &n, "root");

        let missing = Condition::Compare {
            variable: n.clone(),
            attribute: "height".to_string(),
            op: CompareOp::Neq,
            value: Value::Int(3),
        };
        assert!(!eval.matches(&missing));
        assert!(eval.matches(&Condition::IsNull {
            variable: n,
            attribute: "height".to_string(),
        }));
    }

    #[test]
    fn test_compare_coerces_numbers() {
        assert!(compare(&Value::Int(2), CompareOp::Eq, &Value::Float(2.0)));
        assert!(compare(&Value::Float(1.5), CompareOp::Lt, &Value::Int(2)));
        assert!(!compare(&Value::from("b"), CompareOp::Lt, &Value::Int(2)));
        assert!(compare(&Value::from("b"), CompareOp::Gte, &Value::from("a")));
    }
}
