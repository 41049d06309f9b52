//! Risk rule evaluation over payment data

use crate::types::{CriterionExpr, RiskRule, RuleOperator};
use serde_json::Value;
use tracing::debug;

/// Outcome of evaluating a rule set
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    /// Factors recorded by fired rules
    pub factors: Vec<String>,

    /// Sum of fired rules' score deltas
    pub score_delta: f64,
}

/// Evaluate every rule against the payment data
pub fn evaluate_rules(rules: &[RiskRule], payment_data: &Value) -> RuleOutcome {
    let mut outcome = RuleOutcome::default();

    for rule in rules {
        if rule_fires(rule, payment_data) {
            debug!("Risk rule '{}' fired (+{:.2})", rule.name, rule.score_delta);
            outcome.factors.push(rule.factor.clone());
            outcome.score_delta += rule.score_delta;
        }
    }

    outcome
}

fn rule_fires(rule: &RiskRule, payment_data: &Value) -> bool {
    let Some(actual) = lookup(payment_data, &rule.field) else {
        return false;
    };

    match rule.operator {
        RuleOperator::Gt => compare_numeric(actual, &rule.value, |a, b| a > b),
        RuleOperator::Gte => compare_numeric(actual, &rule.value, |a, b| a >= b),
        RuleOperator::Lt => compare_numeric(actual, &rule.value, |a, b| a < b),
        RuleOperator::Lte => compare_numeric(actual, &rule.value, |a, b| a <= b),
        RuleOperator::Eq => loose_eq(actual, &rule.value),
        RuleOperator::Ne => !loose_eq(actual, &rule.value),
        RuleOperator::Contains => match (actual.as_str(), rule.value.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        RuleOperator::In => rule
            .value
            .as_array()
            .map(|candidates| candidates.iter().any(|c| loose_eq(actual, c)))
            .unwrap_or(false),
    }
}

/// Evaluate a decision criterion expression over score and factors
pub fn evaluate_criterion(expr: &CriterionExpr, score: f64, factors: &[String]) -> bool {
    match expr {
        CriterionExpr::ScoreAtLeast { threshold } => score >= *threshold,
        CriterionExpr::ScoreBelow { threshold } => score < *threshold,
        CriterionExpr::FactorPresent { factor } => factors.iter().any(|f| f == factor),
        CriterionExpr::And { exprs } => exprs.iter().all(|e| evaluate_criterion(e, score, factors)),
        CriterionExpr::Or { exprs } => exprs.iter().any(|e| evaluate_criterion(e, score, factors)),
        CriterionExpr::Not { expr } => !evaluate_criterion(expr, score, factors),
    }
}

fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn numeric(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn compare_numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (numeric(actual), numeric(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    // "100" and 100 compare equal across representations
    match (numeric(actual), numeric(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
