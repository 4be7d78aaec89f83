//! Reconciliation rules
//!
//! Rules grade discrepancies and gate auto-resolution. Global rules apply
//! to every tenant; tenant rules follow them in resolution order, so a
//! tenant rule that matches the same discrepancy takes effect by position.
//! Ties break by insertion order.

use crate::domains::discrepancy::{DiscrepancyKind, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Who a rule applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Global,
    Tenant(Uuid),
}

/// What a rule governs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    QuantityThreshold,
    PriceThreshold,
    StatusCheck,
    AutoResolve,
}

impl RuleKind {
    /// Which discrepancy kind this rule grades
    pub fn discrepancy_kind(&self) -> DiscrepancyKind {
        match self {
            RuleKind::QuantityThreshold | RuleKind::AutoResolve => DiscrepancyKind::Quantity,
            RuleKind::PriceThreshold => DiscrepancyKind::Price,
            RuleKind::StatusCheck => DiscrepancyKind::Status,
        }
    }
}

/// Condition operators with documented semantics: `contains` on strings is
/// case-insensitive substring, on arrays is membership.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Contains,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Contains => "contains",
        };
        f.write_str(s)
    }
}

/// A single predicate over the discrepancy context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub source_system: Option<String>,
    pub target_system: Option<String>,
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl RuleCondition {
    /// Evaluate against a context. A missing field fails the condition.
    pub fn matches(&self, context: &RuleContext) -> bool {
        if let Some(source) = &self.source_system {
            if context.source_system != *source {
                return false;
            }
        }
        if let Some(target) = &self.target_system {
            if context.target_system != *target {
                return false;
            }
        }
        let Some(actual) = context.fields.get(&self.field) else {
            return false;
        };
        evaluate(self.operator, actual, &self.value)
    }
}

fn evaluate(operator: Operator, actual: &Value, expected: &Value) -> bool {
    match operator {
        Operator::Eq => values_equal(actual, expected),
        Operator::Ne => !values_equal(actual, expected),
        Operator::Gt => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        Operator::Lt => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
        Operator::Contains => match actual {
            Value::String(haystack) => expected
                .as_str()
                .map(|needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
            _ => false,
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Context a rule is evaluated against
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub source_system: String,
    pub target_system: String,
    pub fields: BTreeMap<String, Value>,
}

/// A grading / auto-resolution policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRule {
    pub rule_id: Uuid,
    pub scope: RuleScope,
    pub kind: RuleKind,
    /// Strict threshold: a diff equal to it emits nothing
    pub threshold: f64,
    /// Grades matching discrepancies; only ever raises severity
    pub severity: Severity,
    pub auto_resolve: bool,
    pub enabled: bool,
    pub conditions: Vec<RuleCondition>,
}

impl ReconciliationRule {
    pub fn matches(&self, context: &RuleContext) -> bool {
        self.enabled && self.conditions.iter().all(|c| c.matches(context))
    }
}

/// Resolution order: global rules first, then tenant rules, disabled rules
/// dropped. Position decides ties.
pub fn resolve_rules(
    global: &[ReconciliationRule],
    tenant: &[ReconciliationRule],
) -> Vec<ReconciliationRule> {
    global
        .iter()
        .chain(tenant.iter())
        .filter(|rule| rule.enabled)
        .cloned()
        .collect()
}

/// First matching rule of the given kind, plus whether any matching rule
/// carries a higher severity (which vetoes auto-resolution).
pub fn effective_rule<'a>(
    rules: &'a [ReconciliationRule],
    kind: DiscrepancyKind,
    context: &RuleContext,
) -> (Option<&'a ReconciliationRule>, Option<Severity>) {
    let mut first_match = None;
    let mut highest = None;
    for rule in rules {
        if rule.kind.discrepancy_kind() != kind || !rule.matches(context) {
            continue;
        }
        if first_match.is_none() {
            first_match = Some(rule);
        }
        if highest.map_or(true, |h| rule.severity > h) {
            highest = Some(rule.severity);
        }
    }
    (first_match, highest)
}
