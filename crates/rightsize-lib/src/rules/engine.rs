//! Rule engine: match, gate, interpolate, resolve
//!
//! For each rule the engine checks the selector, evaluates the optional
//! condition and interpolates `set`/`set_env`. Every surviving rule becomes a
//! candidate patch, and the candidates are merged by [`resolver::resolve`].
//! Failing conditions and templates drop the rule; they never abort the run.

use super::condition::{self, ConditionError};
use super::expr::{ArithmeticEvaluator, ExpressionEvaluator};
use super::matcher;
use super::resolver;
use super::template::{interpolate_map, InterpolationError};
use crate::models::{Patch, Rule, Service, ServiceStats};
use tracing::debug;

/// Why a matched rule did not become a candidate
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    ConditionFalse,
    Condition(ConditionError),
    Interpolation(InterpolationError),
}

impl DropReason {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            DropReason::ConditionFalse => "condition_false",
            DropReason::Condition(_) => "condition_error",
            DropReason::Interpolation(_) => "interpolation_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRule {
    pub rule_id: String,
    pub reason: DropReason,
}

/// Resolved patch plus a trace of how it was reached
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub patch: Patch,
    /// Ids of rules that produced a candidate, in rule order
    pub candidates: Vec<String>,
    pub dropped: Vec<DroppedRule>,
}

/// Rule engine parameterised by the template expression evaluator.
///
/// The engine is stateless: it can be shared across threads and called for
/// several services at once.
#[derive(Debug, Clone, Default)]
pub struct Engine<E = ArithmeticEvaluator> {
    evaluator: E,
}

impl Engine<ArithmeticEvaluator> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: ExpressionEvaluator> Engine<E> {
    /// Create an engine with a custom expression evaluator
    pub fn with_evaluator(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// Evaluate all rules for one service and return the resolved patch
    pub fn apply(&self, rules: &[Rule], service: &Service, facts: &ServiceStats) -> Patch {
        self.evaluate(rules, service, facts).patch
    }

    /// Like [`Engine::apply`], also reporting candidates and dropped rules
    pub fn evaluate(&self, rules: &[Rule], service: &Service, facts: &ServiceStats) -> Evaluation {
        let mut candidates = Vec::new();
        let mut dropped = Vec::new();

        for rule in rules {
            if !matcher::matches(&rule.selector, service) {
                continue;
            }

            match self.candidate(rule, service, facts) {
                Ok(patch) => candidates.push(patch),
                Err(reason) => {
                    debug!(
                        rule_id = %rule.id,
                        service = %service.name,
                        reason = reason.label(),
                        detail = ?reason,
                        "Skipping rule"
                    );
                    dropped.push(DroppedRule {
                        rule_id: rule.id.clone(),
                        reason,
                    });
                }
            }
        }

        let candidate_ids = candidates
            .iter()
            .filter_map(|p: &Patch| p.rule_id.clone())
            .collect();
        let patch = resolver::resolve(&service.name, candidates);

        Evaluation {
            patch,
            candidates: candidate_ids,
            dropped,
        }
    }

    /// Build the candidate patch for a rule whose selector already matched
    fn candidate(
        &self,
        rule: &Rule,
        service: &Service,
        facts: &ServiceStats,
    ) -> Result<Patch, DropReason> {
        if let Some(cond) = rule.condition.as_deref().filter(|c| !c.trim().is_empty()) {
            match condition::evaluate(cond, facts) {
                Ok(true) => {}
                Ok(false) => return Err(DropReason::ConditionFalse),
                Err(e) => return Err(DropReason::Condition(e)),
            }
        }

        let set = interpolate_map(&rule.set, facts, &self.evaluator)
            .map_err(DropReason::Interpolation)?;
        let set_env = interpolate_map(&rule.set_env, facts, &self.evaluator)
            .map_err(DropReason::Interpolation)?;

        Ok(Patch {
            service_name: service.name.clone(),
            set,
            set_env,
            action: rule.action.clone(),
            priority: rule.priority,
            rule_id: Some(rule.id.clone()),
        })
    }
}

/// Apply rules with the default expression evaluator
pub fn apply(rules: &[Rule], service: &Service, facts: &ServiceStats) -> Patch {
    Engine::new().apply(rules, service, facts)
}
