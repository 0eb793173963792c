//! Expression language for `{...}` spans in rule templates
//!
//! Expressions are compiled and evaluated with minijinja in strict undefined
//! mode, so every fact name must exist in the fact bag. On top of the
//! built-in operators a small set of numeric helpers is registered:
//! `int`, `float`, `round`, `ceil`, `floor`, `min`, `max` and `abs`.
//! Evaluation goes through [`ExpressionEvaluator`] so the language can be
//! swapped without touching the interpolator.

use crate::models::{FactValue, ServiceStats};
use minijinja::value::ValueKind;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Longest expression accepted; bounds parser recursion on hostile templates
pub const MAX_EXPRESSION_LEN: usize = 256;

/// Evaluates one expression against a fact bag
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, facts: &ServiceStats) -> Result<FactValue, ExprError>;
}

/// Expression failures. Syntax, name and arity errors are compile errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unknown name: {0}")]
    UnknownName(String),
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("bad arguments: {0}")]
    Arity(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("expression produced {0}, expected a number or string")]
    UnsupportedResult(String),
    #[error("evaluation failed: {0}")]
    Eval(String),
}

impl ExprError {
    /// True for errors caused by the expression text rather than the facts' values
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            ExprError::Syntax(_)
                | ExprError::UnknownName(_)
                | ExprError::UnknownFunction(_)
                | ExprError::Arity(_)
        )
    }
}

impl From<Error> for ExprError {
    fn from(err: Error) -> Self {
        let message = err
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| err.kind().to_string());
        match err.kind() {
            ErrorKind::SyntaxError => ExprError::Syntax(message),
            ErrorKind::UndefinedError => ExprError::UnknownName(message),
            ErrorKind::UnknownFunction => ExprError::UnknownFunction(message),
            ErrorKind::MissingArgument | ErrorKind::TooManyArguments => ExprError::Arity(message),
            _ => ExprError::Eval(message),
        }
    }
}

/// Default evaluator backed by a minijinja environment
#[derive(Debug, Clone)]
pub struct ArithmeticEvaluator {
    env: Environment<'static>,
}

impl ArithmeticEvaluator {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_function("int", int);
        env.add_function("float", float);
        env.add_function("round", |v: Value| rounded(v, f64::round));
        env.add_function("ceil", |v: Value| rounded(v, f64::ceil));
        env.add_function("floor", |v: Value| rounded(v, f64::floor));
        env.add_function("min", |a: Value, b: Value| pick(a, b, false));
        env.add_function("max", |a: Value, b: Value| pick(a, b, true));
        env.add_function("abs", abs);

        Self { env }
    }
}

impl Default for ArithmeticEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn evaluate(&self, expression: &str, facts: &ServiceStats) -> Result<FactValue, ExprError> {
        if expression.len() > MAX_EXPRESSION_LEN {
            return Err(ExprError::Syntax(format!(
                "expression longer than {} bytes",
                MAX_EXPRESSION_LEN
            )));
        }

        let compiled = self.env.compile_expression(expression)?;
        let value = compiled.eval(context(facts))?;
        to_fact(expression, value)
    }
}

fn context(facts: &ServiceStats) -> BTreeMap<&str, Value> {
    facts
        .iter()
        .map(|(key, fact)| {
            let value = match fact {
                FactValue::Int(v) => Value::from(*v),
                FactValue::Float(v) => Value::from(*v),
                FactValue::Str(s) => Value::from(s.as_str()),
            };
            (key.as_str(), value)
        })
        .collect()
}

fn to_fact(expression: &str, value: Value) -> Result<FactValue, ExprError> {
    match value.kind() {
        ValueKind::Undefined => Err(ExprError::UnknownName(expression.trim().to_string())),
        ValueKind::Number if value.is_integer() => i64::try_from(value)
            .map(FactValue::Int)
            .map_err(|_| ExprError::Overflow),
        ValueKind::Number => {
            let v = f64::try_from(value).map_err(ExprError::from)?;
            if v.is_finite() {
                Ok(FactValue::Float(v))
            } else {
                Err(ExprError::DivisionByZero)
            }
        }
        ValueKind::String => Ok(FactValue::Str(value.as_str().unwrap_or_default().to_string())),
        kind => Err(ExprError::UnsupportedResult(kind.to_string())),
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(v) => Value::from(v),
            Number::Float(v) => Value::from(v),
        }
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

/// Read a numeric argument; numeric strings are parsed
fn number(value: &Value) -> Result<Number, Error> {
    if value.is_undefined() {
        return Err(Error::new(ErrorKind::UndefinedError, "undefined value"));
    }
    if value.is_integer() {
        return i64::try_from(value.clone())
            .map(Number::Int)
            .map_err(|_| invalid("integer overflow"));
    }
    if value.is_number() {
        let v = f64::try_from(value.clone())?;
        return finite(v).map(Number::Float);
    }
    if let Some(s) = value.as_str() {
        let trimmed = s.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return Ok(Number::Int(v));
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            return finite(v).map(Number::Float);
        }
        return Err(invalid(format!("value {:?} is not numeric", s)));
    }
    Err(invalid(format!("cannot use {} as a number", value.kind())))
}

fn finite(v: f64) -> Result<f64, Error> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(invalid("division by zero or non-finite value"))
    }
}

fn to_int(v: f64) -> Result<Value, Error> {
    let v = finite(v)?;
    if v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return Err(invalid("integer overflow"));
    }
    Ok(Value::from(v as i64))
}

/// Truncating coercion to an integer
fn int(value: Value) -> Result<Value, Error> {
    match number(&value)? {
        Number::Int(v) => Ok(Value::from(v)),
        Number::Float(v) => to_int(v.trunc()),
    }
}

fn float(value: Value) -> Result<Value, Error> {
    Ok(Value::from(number(&value)?.as_f64()))
}

fn rounded(value: Value, op: fn(f64) -> f64) -> Result<Value, Error> {
    match number(&value)? {
        Number::Int(v) => Ok(Value::from(v)),
        Number::Float(v) => to_int(op(v)),
    }
}

fn pick(a: Value, b: Value, pick_max: bool) -> Result<Value, Error> {
    let (a, b) = (number(&a)?, number(&b)?);
    let picked = match (a, b) {
        (Number::Int(a), Number::Int(b)) => Number::Int(if pick_max { a.max(b) } else { a.min(b) }),
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            Number::Float(if pick_max { a.max(b) } else { a.min(b) })
        }
    };
    Ok(picked.into())
}

fn abs(value: Value) -> Result<Value, Error> {
    match number(&value)? {
        Number::Int(v) => v
            .checked_abs()
            .map(Value::from)
            .ok_or_else(|| invalid("integer overflow")),
        Number::Float(v) => Ok(Value::from(v.abs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> ServiceStats {
        ServiceStats::new()
            .with("peak_mem_mb", 1000)
            .with("avg_mem_mb", 412.5)
            .with("service_name", "db")
            .with("limit", "2048")
    }

    fn eval(expression: &str) -> Result<FactValue, ExprError> {
        ArithmeticEvaluator::new().evaluate(expression, &facts())
    }

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        assert_eq!(eval("peak_mem_mb * 2 + 48").unwrap(), FactValue::Int(2048));
        assert_eq!(eval("(peak_mem_mb - 100) % 7").unwrap(), FactValue::Int(4));
    }

    #[test]
    fn test_division_is_float() {
        assert_eq!(eval("peak_mem_mb / 4").unwrap(), FactValue::Float(250.0));
        assert_eq!(eval("peak_mem_mb / 4").unwrap().to_string(), "250");
    }

    #[test]
    fn test_mixed_arithmetic_is_float() {
        assert_eq!(eval("avg_mem_mb * 2").unwrap(), FactValue::Float(825.0));
        assert_eq!(eval("peak_mem_mb * 1.5").unwrap().to_string(), "1500");
    }

    #[test]
    fn test_precedence_and_unary_minus() {
        assert_eq!(eval("2 + 3 * 4").unwrap(), FactValue::Int(14));
        assert_eq!(eval("(2 + 3) * 4").unwrap(), FactValue::Int(20));
        assert_eq!(eval("-peak_mem_mb + 1").unwrap(), FactValue::Int(-999));
    }

    #[test]
    fn test_numeric_functions() {
        assert_eq!(eval("int(avg_mem_mb)").unwrap(), FactValue::Int(412));
        assert_eq!(eval("float(peak_mem_mb)").unwrap(), FactValue::Float(1000.0));
        assert_eq!(eval("int(limit) / 2").unwrap().to_string(), "1024");
        assert_eq!(eval("ceil(avg_mem_mb + 0.2)").unwrap(), FactValue::Int(413));
        assert_eq!(eval("round(avg_mem_mb)").unwrap(), FactValue::Int(413));
        assert_eq!(eval("floor(avg_mem_mb)").unwrap(), FactValue::Int(412));
        assert_eq!(eval("max(peak_mem_mb, 2048)").unwrap(), FactValue::Int(2048));
        assert_eq!(eval("min(avg_mem_mb, 100)").unwrap(), FactValue::Float(100.0));
        assert_eq!(eval("abs(-5)").unwrap(), FactValue::Int(5));
    }

    #[test]
    fn test_bundled_rule_templates() {
        let facts = ServiceStats::new()
            .with("peak_mem_mb", 1200)
            .with("peak_cpu_percent", 30);
        let evaluator = ArithmeticEvaluator::new();

        let mem = evaluator.evaluate("int(peak_mem_mb * 1.25)", &facts).unwrap();
        assert_eq!(mem.to_string(), "1500");

        let cpus = evaluator
            .evaluate("max(ceil(peak_cpu_percent / 100 * 15) / 10, 0.25)", &facts)
            .unwrap();
        assert_eq!(cpus.to_string(), "0.5");
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            eval("service_name + '-tuned'").unwrap(),
            FactValue::Str("db-tuned".to_string())
        );
        assert!(eval("service_name - 1").is_err());
    }

    #[test]
    fn test_unknown_name_is_compile_error() {
        let err = eval("missing_metric * 2").unwrap_err();
        assert!(matches!(err, ExprError::UnknownName(_)));
        assert!(err.is_compile_error());

        let err = eval("missing_metric").unwrap_err();
        assert!(matches!(err, ExprError::UnknownName(_)));
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert!(matches!(eval("sqrt(4)"), Err(ExprError::UnknownFunction(_))));
        assert!(matches!(eval("max(1)"), Err(ExprError::Arity(_))));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(eval("1 +"), Err(ExprError::Syntax(_))));
        assert!(matches!(eval("(1 + 2"), Err(ExprError::Syntax(_))));
        assert!(matches!(eval("1 2"), Err(ExprError::Syntax(_))));
        assert!(matches!(eval("'open"), Err(ExprError::Syntax(_))));
    }

    #[test]
    fn test_non_value_result_rejected() {
        assert!(matches!(
            eval("peak_mem_mb > 1"),
            Err(ExprError::UnsupportedResult(_))
        ));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let unary = format!("{}1", "-".repeat(5000));
        assert!(matches!(eval(&unary), Err(ExprError::Syntax(_))));

        let parens = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        assert!(matches!(eval(&parens), Err(ExprError::Syntax(_))));
    }

    #[test]
    fn test_runtime_errors() {
        let err = eval("peak_mem_mb / 0").unwrap_err();
        assert!(!err.is_compile_error());

        let err = eval("avg_mem_mb / 0.0").unwrap_err();
        assert!(!err.is_compile_error());

        let err = eval("5 % 0").unwrap_err();
        assert!(!err.is_compile_error());

        assert!(eval("int(peak_mem_mb / 0)").is_err());
        assert!(eval("int(service_name)").is_err());
    }
}
