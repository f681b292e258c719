//! Boolean conditions over graph pattern variables
//!
//! A [`Condition`] is the output of the filter compiler. It references the
//! caller's pattern variable and, for relationship quantifiers, introduces
//! scoped variables of its own. `Display` renders the Cypher form the query
//! layer embeds into a `WHERE` clause.

use crate::error::{Error, Result};
use crate::relationship::Direction;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pattern variable bound to a node by the query layer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Validate a caller-supplied name before it is written into a query
    pub fn parse(name: &str) -> Result<Self> {
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::InvalidVariable(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out variable names that cannot clash with each other inside one
/// generated condition
#[derive(Debug)]
pub struct VariableGenerator {
    prefix: String,
    next: usize,
}

impl VariableGenerator {
    /// Names are derived from `root`, e.g. `n_r0`, `n_r1`, ...
    pub fn new(root: &Variable) -> Self {
        Self {
            prefix: format!("{}_r", root.name()),
            next: 0,
        }
    }

    pub fn fresh(&mut self) -> Variable {
        let var = Variable(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        var
    }
}

/// Directed edge between two pattern variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePattern {
    /// The node the relationship is declared on
    pub root: Variable,
    /// The related node
    pub related: Variable,
    pub label: String,
    pub direction: Direction,
}

impl fmt::Display for EdgePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Outgoing => {
                write!(f, "({})-[:{}]->({})", self.root, self.label, self.related)
            }
            Direction::Incoming => {
                write!(f, "({})<-[:{}]-({})", self.root, self.label, self.related)
            }
        }
    }
}

/// Scalar comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Contains => "CONTAINS",
            Self::StartsWith => "STARTS WITH",
            Self::EndsWith => "ENDS WITH",
        };
        write!(f, "{}", s)
    }
}

/// How many related nodes have to match a nested condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantifier {
    /// Every related node matches (vacuously true without related nodes)
    All,
    /// At least one related node matches
    Some,
    /// No related node matches
    None,
}

impl Quantifier {
    pub const ALL: [Quantifier; 3] = [Quantifier::All, Quantifier::Some, Quantifier::None];

    /// Filter field name of the quantifier
    pub fn name(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Some => "some",
            Self::None => "none",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::All => "Filters for nodes where all of the related nodes match this filter",
            Self::Some => "Filters for nodes where some of the related nodes match this filter",
            Self::None => "Filters for nodes where none of the related nodes match this filter",
        }
    }

    /// Cypher list predicate function
    fn function(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Some => "any",
            Self::None => "none",
        }
    }
}

/// A boolean condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    True,
    False,
    Compare {
        variable: Variable,
        attribute: String,
        op: CompareOp,
        value: Value,
    },
    In {
        variable: Variable,
        attribute: String,
        values: Vec<Value>,
    },
    IsNull {
        variable: Variable,
        attribute: String,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    /// List predicate over every node adjacent through `pattern`; `pattern.related`
    /// is bound in `predicate`
    Quantified {
        quantifier: Quantifier,
        pattern: EdgePattern,
        predicate: Box<Condition>,
    },
}

impl Condition {
    /// Conjunction; `True` for no conditions
    pub fn all_of(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut conditions: Vec<Condition> = conditions.into_iter().collect();
        match conditions.len() {
            0 => Self::True,
            1 => conditions.remove(0),
            _ => Self::And(conditions),
        }
    }

    /// Disjunction; `False` for no conditions
    pub fn any_of(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut conditions: Vec<Condition> = conditions.into_iter().collect();
        match conditions.len() {
            0 => Self::False,
            1 => conditions.remove(0),
            _ => Self::Or(conditions),
        }
    }

    pub fn negate(condition: Condition) -> Self {
        Self::Not(Box::new(condition))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Compare {
                variable,
                attribute,
                op,
                value,
            } => write!(f, "{}.{} {} {}", variable, attribute, op, value),
            Self::In {
                variable,
                attribute,
                values,
            } => {
                write!(f, "{}.{} IN [", variable, attribute)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Self::IsNull {
                variable,
                attribute,
            } => write!(f, "{}.{} IS NULL", variable, attribute),
            Self::And(conditions) => write_joined(f, conditions, " AND ", "true"),
            Self::Or(conditions) => write_joined(f, conditions, " OR ", "false"),
            Self::Not(condition) => write!(f, "NOT ({})", condition),
            Self::Quantified {
                quantifier,
                pattern,
                predicate,
            } => write!(
                f,
                "{}({} IN [{} | {}] WHERE {})",
                quantifier.function(),
                pattern.related,
                pattern,
                pattern.related,
                predicate
            ),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    conditions: &[Condition],
    separator: &str,
    empty: &str,
) -> fmt::Result {
    if conditions.is_empty() {
        return write!(f, "{}", empty);
    }
    write!(f, "(")?;
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", separator)?;
        }
        write!(f, "{}", condition)?;
    }
    write!(f, ")")
}
