mod rules;

pub use rules::{Comparison, Rule, RuleParseError};

use super::catalog::BadgeDefinition;
use super::metrics::MetricSnapshot;

/// Decide whether a snapshot satisfies a badge's rule.
///
/// Pure and total: no I/O, and identical inputs always produce the same answer.
pub fn evaluate(definition: &BadgeDefinition, snapshot: &MetricSnapshot) -> bool {
    definition.rule.is_satisfied_by(snapshot)
}

/// Stateless evaluator handed to the orchestrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, definition: &BadgeDefinition, snapshot: &MetricSnapshot) -> bool {
        evaluate(definition, snapshot)
    }
}
