//! Scalar filter operators and the operator set of each attribute type

use serde::{Deserialize, Serialize};
use trellis_core::{AttributeType, CompareOp};

/// Operator usable on a scalar field filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarOperator {
    Equals,
    NotEquals,
    In,
    IsNull,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
}

const EQUALITY: [ScalarOperator; 4] = [
    ScalarOperator::Equals,
    ScalarOperator::NotEquals,
    ScalarOperator::In,
    ScalarOperator::IsNull,
];

const NUMERIC: [ScalarOperator; 8] = [
    ScalarOperator::Equals,
    ScalarOperator::NotEquals,
    ScalarOperator::In,
    ScalarOperator::IsNull,
    ScalarOperator::Lt,
    ScalarOperator::Lte,
    ScalarOperator::Gt,
    ScalarOperator::Gte,
];

const TEXT: [ScalarOperator; 11] = [
    ScalarOperator::Equals,
    ScalarOperator::NotEquals,
    ScalarOperator::In,
    ScalarOperator::IsNull,
    ScalarOperator::Lt,
    ScalarOperator::Lte,
    ScalarOperator::Gt,
    ScalarOperator::Gte,
    ScalarOperator::Contains,
    ScalarOperator::StartsWith,
    ScalarOperator::EndsWith,
];

const BOOLEAN: [ScalarOperator; 3] = [
    ScalarOperator::Equals,
    ScalarOperator::NotEquals,
    ScalarOperator::IsNull,
];

impl ScalarOperator {
    /// Field name of the operator in filter input
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::In => "in",
            Self::IsNull => "isNull",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TEXT.into_iter().find(|op| op.name() == name)
    }

    /// Comparison emitted for this operator; None for `in` and `isNull`
    pub fn compare_op(&self) -> Option<CompareOp> {
        match self {
            Self::Equals => Some(CompareOp::Eq),
            Self::NotEquals => Some(CompareOp::Neq),
            Self::Lt => Some(CompareOp::Lt),
            Self::Lte => Some(CompareOp::Lte),
            Self::Gt => Some(CompareOp::Gt),
            Self::Gte => Some(CompareOp::Gte),
            Self::Contains => Some(CompareOp::Contains),
            Self::StartsWith => Some(CompareOp::StartsWith),
            Self::EndsWith => Some(CompareOp::EndsWith),
            Self::In | Self::IsNull => None,
        }
    }
}

impl std::fmt::Display for ScalarOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Operators supported by an attribute type, None if the type is unmapped
pub fn operators_for(ty: &AttributeType) -> Option<&'static [ScalarOperator]> {
    match ty {
        AttributeType::String => Some(&TEXT),
        AttributeType::Int | AttributeType::Float => Some(&NUMERIC),
        AttributeType::Id => Some(&EQUALITY),
        AttributeType::Boolean => Some(&BOOLEAN),
        AttributeType::Other(_) => None,
    }
}
