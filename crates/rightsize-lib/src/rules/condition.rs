//! Single-comparison condition evaluation
//!
//! Conditions have the form `<fact> <op> <number>`. Compound predicates,
//! parentheses and non-numeric comparisons are not supported.

use crate::models::{NotNumeric, ServiceStats};
use thiserror::Error;

/// Two-character operators come first so `>=` is never read as `>`.
const OPERATORS: [Comparison; 6] = [
    Comparison::Ge,
    Comparison::Le,
    Comparison::Gt,
    Comparison::Lt,
    Comparison::Eq,
    Comparison::Ne,
];

/// Reasons a condition cannot be evaluated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("unsupported condition format: {0}")]
    UnsupportedOperator(String),
    #[error("invalid condition format: {0}")]
    InvalidFormat(String),
    #[error("metric not found: {0}")]
    MissingFact(String),
    #[error("invalid comparison value: {0}")]
    InvalidLiteral(String),
    #[error("cannot convert {key} to number")]
    NotNumeric {
        key: String,
        #[source]
        source: NotNumeric,
    },
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
    Ne,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }

    pub fn apply(&self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Ge => left >= right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Lt => left < right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }
}

/// A parsed `<fact> <op> <number>` condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub fact: String,
    pub op: Comparison,
    pub threshold: f64,
}

impl Condition {
    pub fn parse(condition: &str) -> Result<Self, ConditionError> {
        let condition = condition.trim();

        let op = OPERATORS
            .iter()
            .copied()
            .find(|op| condition.contains(op.symbol()))
            .ok_or_else(|| ConditionError::UnsupportedOperator(condition.to_string()))?;

        let parts: Vec<&str> = condition.split(op.symbol()).collect();
        let [left, right] = parts.as_slice() else {
            return Err(ConditionError::InvalidFormat(condition.to_string()));
        };

        let fact = left.trim();
        if fact.is_empty() {
            return Err(ConditionError::InvalidFormat(condition.to_string()));
        }

        let literal = right.trim();
        let threshold = literal
            .parse::<f64>()
            .map_err(|_| ConditionError::InvalidLiteral(literal.to_string()))?;

        Ok(Self {
            fact: fact.to_string(),
            op,
            threshold,
        })
    }

    pub fn evaluate(&self, facts: &ServiceStats) -> Result<bool, ConditionError> {
        let value = facts
            .get(&self.fact)
            .ok_or_else(|| ConditionError::MissingFact(self.fact.clone()))?;

        let left = value.as_f64().map_err(|source| ConditionError::NotNumeric {
            key: self.fact.clone(),
            source,
        })?;

        Ok(self.op.apply(left, self.threshold))
    }
}

/// Parse and evaluate a condition against a fact bag
pub fn evaluate(condition: &str, facts: &ServiceStats) -> Result<bool, ConditionError> {
    Condition::parse(condition)?.evaluate(facts)
}
