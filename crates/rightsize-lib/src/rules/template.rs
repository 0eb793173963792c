//! Template interpolation for rule outputs
//!
//! A template is split into literal text and `{expression}` spans. Spans do
//! not nest: an expression runs from `{` to the next `}` and must not be
//! empty. `{}` and an unclosed `{` are kept as literal text.

use super::expr::{ExprError, ExpressionEvaluator};
use crate::models::ServiceStats;
use std::collections::BTreeMap;
use thiserror::Error;

/// A piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Expression(&'a str),
}

/// Interpolation failure for a single template or map entry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("failed to compile expression {expression:?}: {source}")]
    Compile {
        expression: String,
        #[source]
        source: ExprError,
    },
    #[error("failed to run expression {expression:?}: {source}")]
    Run {
        expression: String,
        #[source]
        source: ExprError,
    },
    #[error("failed to interpolate key '{key}': {source}")]
    Key {
        key: String,
        #[source]
        source: Box<InterpolationError>,
    },
}

/// Split a template into literal and expression segments
pub fn tokenize(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(open) = template[cursor..].find('{').map(|i| cursor + i) {
        let body_start = open + 1;
        match template[body_start..].find('}').map(|i| body_start + i) {
            Some(close) if close > body_start => {
                if open > literal_start {
                    segments.push(Segment::Literal(&template[literal_start..open]));
                }
                segments.push(Segment::Expression(&template[body_start..close]));
                cursor = close + 1;
                literal_start = cursor;
            }
            Some(_) => cursor = body_start,
            None => break,
        }
    }

    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }

    segments
}

/// Substitute every expression span; the first failure aborts the whole template
pub fn interpolate(
    template: &str,
    facts: &ServiceStats,
    evaluator: &dyn ExpressionEvaluator,
) -> Result<String, InterpolationError> {
    let mut out = String::with_capacity(template.len());

    for segment in tokenize(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Expression(expression) => {
                let value = evaluator.evaluate(expression, facts).map_err(|source| {
                    if source.is_compile_error() {
                        InterpolationError::Compile {
                            expression: expression.to_string(),
                            source,
                        }
                    } else {
                        InterpolationError::Run {
                            expression: expression.to_string(),
                            source,
                        }
                    }
                })?;
                out.push_str(&value.to_string());
            }
        }
    }

    Ok(out)
}

/// Interpolate every value of a template map. Any failing key fails the map.
pub fn interpolate_map(
    templates: &BTreeMap<String, String>,
    facts: &ServiceStats,
    evaluator: &dyn ExpressionEvaluator,
) -> Result<BTreeMap<String, String>, InterpolationError> {
    templates
        .iter()
        .map(|(key, template)| {
            interpolate(template, facts, evaluator)
                .map(|value| (key.clone(), value))
                .map_err(|source| InterpolationError::Key {
                    key: key.clone(),
                    source: Box::new(source),
                })
        })
        .collect()
}
