//! Discrepancy analysis and grading
//!
//! Pure functions: no I/O, no clocks. The engine feeds in the pair of
//! values, the resolved rule set and item context; out comes a graded
//! draft or nothing when the difference sits inside the threshold.

use crate::domains::discrepancy::{DiscrepancyKind, Severity, SuggestedAction};
use crate::domains::rules::{effective_rule, ReconciliationRule, RuleContext};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// A graded discrepancy before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct DiscrepancyDraft {
    pub kind: DiscrepancyKind,
    pub severity: Severity,
    pub confidence: f64,
    pub impact_score: f64,
    pub suggested_action: SuggestedAction,
    /// Whether the auto-resolve gate passed: low severity, a matching
    /// rule with auto_resolve, and no higher-severity rule matching
    pub auto_resolvable: bool,
    pub diff: f64,
}

/// Item-level context threaded into the analysis
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub source_system: String,
    pub has_prior_discrepancy: bool,
    pub unit_price: Option<Decimal>,
}

/// How much a reporting system is trusted
pub fn source_reliability(source_system: &str) -> f64 {
    match source_system {
        "marketplace" => 0.95,
        "manual" => 0.70,
        _ => 0.80,
    }
}

/// Quantity ladder; bounds are inclusive upper bounds of the lower bucket
pub fn quantity_severity(diff: i64) -> Severity {
    match diff.abs() {
        0..=5 => Severity::Low,
        6..=20 => Severity::Medium,
        21..=100 => Severity::High,
        _ => Severity::Critical,
    }
}

/// Price ladder over percentage deviation
pub fn price_severity(deviation_pct: f64) -> Severity {
    let pct = deviation_pct.abs();
    if pct <= 2.0 {
        Severity::Low
    } else if pct <= 10.0 {
        Severity::Medium
    } else if pct <= 25.0 {
        Severity::High
    } else {
        Severity::Critical
    }
}

fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 1.0,
        Severity::Medium => 3.0,
        Severity::High => 5.0,
        Severity::Critical => 7.0,
    }
}

/// Confidence: source reliability, damped for extreme diffs and repeat
/// offenders, clamped to `[0.1, 1.0]`.
pub fn confidence(source_system: &str, diff: f64, has_prior_discrepancy: bool) -> f64 {
    let mut confidence = source_reliability(source_system);
    if diff > 100.0 {
        confidence *= 0.9;
    }
    if has_prior_discrepancy {
        confidence *= 0.95;
    }
    confidence.clamp(0.1, 1.0)
}

/// Impact: `severity_weight + min(5, diff/20) + min(3, unit_price*diff/1000)`,
/// clamped to `[0, 10]`.
pub fn impact_score(severity: Severity, diff: f64, unit_price: Option<Decimal>) -> f64 {
    let price = unit_price.and_then(|p| p.to_f64()).unwrap_or(0.0);
    let score = severity_weight(severity)
        + (diff.abs() / 20.0).min(5.0)
        + (price * diff.abs() / 1000.0).min(3.0);
    score.clamp(0.0, 10.0)
}

fn suggested_action(severity: Severity, auto_resolvable: bool) -> SuggestedAction {
    if severity == Severity::Critical {
        SuggestedAction::Escalate
    } else if severity == Severity::Low && auto_resolvable {
        SuggestedAction::AutoResolve
    } else {
        SuggestedAction::Investigate
    }
}

fn grade(
    kind: DiscrepancyKind,
    base_severity: Severity,
    diff: f64,
    rules: &[ReconciliationRule],
    rule_context: &RuleContext,
    context: &AnalysisContext,
) -> DiscrepancyDraft {
    let (rule, highest_matching) = effective_rule(rules, kind, rule_context);

    // Rule severity overrides upward only: the highest matching grade
    // wins, and nothing ever downgrades the measured severity.
    let mut severity = base_severity;
    if let Some(highest) = highest_matching {
        severity = severity.max(highest);
    }

    // A rule grading the difference above low raises `severity` out of
    // the low bucket, so escalation doubles as the auto-resolve veto.
    let auto_resolvable =
        severity == Severity::Low && rule.map(|r| r.auto_resolve).unwrap_or(false);

    let confidence = confidence(&context.source_system, diff, context.has_prior_discrepancy);
    let impact_score = impact_score(severity, diff, context.unit_price);

    DiscrepancyDraft {
        kind,
        severity,
        confidence,
        impact_score,
        suggested_action: suggested_action(severity, auto_resolvable),
        auto_resolvable,
        diff,
    }
}

/// Quantity path: emits only when `|src - tgt|` exceeds the threshold
/// (strictly; a diff equal to the threshold is silent).
pub fn analyze_quantity(
    source_quantity: i64,
    target_quantity: i64,
    rules: &[ReconciliationRule],
    rule_context: &RuleContext,
    context: &AnalysisContext,
) -> Option<DiscrepancyDraft> {
    let diff = (source_quantity - target_quantity).abs();
    let (rule, _) = effective_rule(rules, DiscrepancyKind::Quantity, rule_context);
    let threshold = rule.map(|r| r.threshold).unwrap_or(0.0);
    if (diff as f64) <= threshold {
        return None;
    }

    Some(grade(
        DiscrepancyKind::Quantity,
        quantity_severity(diff),
        diff as f64,
        rules,
        rule_context,
        context,
    ))
}

/// Price path: threshold and ladder operate on percentage deviation from
/// the target price.
pub fn analyze_price(
    source_price: Decimal,
    target_price: Decimal,
    rules: &[ReconciliationRule],
    rule_context: &RuleContext,
    context: &AnalysisContext,
) -> Option<DiscrepancyDraft> {
    let source = source_price.to_f64().unwrap_or(0.0);
    let target = target_price.to_f64().unwrap_or(0.0);
    let deviation_pct = if target == 0.0 {
        if source == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        ((source - target) / target * 100.0).abs()
    };

    let (rule, _) = effective_rule(rules, DiscrepancyKind::Price, rule_context);
    let threshold = rule.map(|r| r.threshold).unwrap_or(0.0);
    if deviation_pct <= threshold {
        return None;
    }

    Some(grade(
        DiscrepancyKind::Price,
        price_severity(deviation_pct),
        deviation_pct,
        rules,
        rule_context,
        context,
    ))
}

/// Status path: any mismatch grades as medium unless a rule raises it.
pub fn analyze_status(
    source_status: &str,
    target_status: &str,
    rules: &[ReconciliationRule],
    rule_context: &RuleContext,
    context: &AnalysisContext,
) -> Option<DiscrepancyDraft> {
    if source_status == target_status {
        return None;
    }

    Some(grade(
        DiscrepancyKind::Status,
        Severity::Medium,
        1.0,
        rules,
        rule_context,
        context,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::rules::{RuleKind, RuleScope};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn rule(threshold: f64, severity: Severity, auto_resolve: bool) -> ReconciliationRule {
        ReconciliationRule {
            rule_id: Uuid::now_v7(),
            scope: RuleScope::Global,
            kind: RuleKind::QuantityThreshold,
            threshold,
            severity,
            auto_resolve,
            enabled: true,
            conditions: vec![],
        }
    }

    fn marketplace_context() -> AnalysisContext {
        AnalysisContext {
            source_system: "marketplace".to_string(),
            has_prior_discrepancy: false,
            unit_price: None,
        }
    }

    #[test]
    fn test_severity_ladder_boundaries() {
        assert_eq!(quantity_severity(5), Severity::Low);
        assert_eq!(quantity_severity(6), Severity::Medium);
        assert_eq!(quantity_severity(20), Severity::Medium);
        assert_eq!(quantity_severity(21), Severity::High);
        assert_eq!(quantity_severity(100), Severity::High);
        assert_eq!(quantity_severity(101), Severity::Critical);
    }

    #[test]
    fn test_threshold_is_strict() {
        let rules = vec![rule(2.0, Severity::Low, false)];
        let ctx = RuleContext::default();
        let analysis = marketplace_context();

        // diff == threshold emits nothing
        assert!(analyze_quantity(12, 10, &rules, &ctx, &analysis).is_none());
        // diff > threshold emits
        assert!(analyze_quantity(13, 10, &rules, &ctx, &analysis).is_some());
    }

    #[test]
    fn test_no_rule_means_zero_threshold() {
        let draft = analyze_quantity(11, 10, &[], &RuleContext::default(), &marketplace_context())
            .expect("diff of 1 exceeds default threshold");
        assert_eq!(draft.severity, Severity::Low);
    }

    #[test]
    fn test_rule_severity_overrides_upward_only() {
        let ctx = RuleContext::default();
        let analysis = marketplace_context();

        // rule raises a low diff to high
        let raising = vec![rule(0.0, Severity::High, false)];
        let draft = analyze_quantity(12, 10, &raising, &ctx, &analysis).unwrap();
        assert_eq!(draft.severity, Severity::High);

        // rule can never downgrade a critical diff
        let lowering = vec![rule(0.0, Severity::Low, false)];
        let draft = analyze_quantity(200, 5, &lowering, &ctx, &analysis).unwrap();
        assert_eq!(draft.severity, Severity::Critical);
    }

    #[test]
    fn test_confidence_damping() {
        // marketplace base
        assert!((confidence("marketplace", 10.0, false) - 0.95).abs() < 1e-9);
        // large diff damps by 0.9
        assert!((confidence("marketplace", 195.0, false) - 0.855).abs() < 1e-9);
        // repeat offender damps by 0.95
        assert!((confidence("manual", 10.0, true) - 0.665).abs() < 1e-9);
        // unknown sources get the default
        assert!((confidence("warehouse", 10.0, false) - 0.80).abs() < 1e-9);
    }

    #[test]
    fn test_suggested_actions() {
        let ctx = RuleContext::default();
        let analysis = marketplace_context();

        let draft = analyze_quantity(200, 5, &[], &ctx, &analysis).unwrap();
        assert_eq!(draft.suggested_action, SuggestedAction::Escalate);

        let auto = vec![rule(1.0, Severity::Low, true)];
        let draft = analyze_quantity(12, 10, &auto, &ctx, &analysis).unwrap();
        assert_eq!(draft.suggested_action, SuggestedAction::AutoResolve);
        assert!(draft.auto_resolvable);

        let manual = vec![rule(1.0, Severity::Low, false)];
        let draft = analyze_quantity(12, 10, &manual, &ctx, &analysis).unwrap();
        assert_eq!(draft.suggested_action, SuggestedAction::Investigate);
    }

    #[test]
    fn test_higher_severity_rule_vetoes_auto_resolve() {
        let rules = vec![rule(1.0, Severity::Low, true), rule(1.0, Severity::High, false)];
        let draft = analyze_quantity(
            12,
            10,
            &rules,
            &RuleContext::default(),
            &marketplace_context(),
        )
        .unwrap();
        // first rule matched, but the high-severity match raises the grade
        // and blocks auto-resolution
        assert!(!draft.auto_resolvable);
        assert_eq!(draft.severity, Severity::High);
    }

    #[test]
    fn test_price_deviation_path() {
        let ctx = RuleContext::default();
        let analysis = marketplace_context();

        // identical prices emit nothing
        assert!(analyze_price(
            Decimal::new(1999, 2),
            Decimal::new(1999, 2),
            &[],
            &ctx,
            &analysis
        )
        .is_none());

        // 50% deviation grades critical
        let draft =
            analyze_price(Decimal::new(30, 0), Decimal::new(20, 0), &[], &ctx, &analysis).unwrap();
        assert_eq!(draft.severity, Severity::Critical);
        assert_eq!(draft.kind, DiscrepancyKind::Price);
    }

    #[test]
    fn test_status_mismatch_grades_medium() {
        let draft = analyze_status(
            "active",
            "suppressed",
            &[],
            &RuleContext::default(),
            &marketplace_context(),
        )
        .unwrap();
        assert_eq!(draft.severity, Severity::Medium);
        assert!(analyze_status(
            "active",
            "active",
            &[],
            &RuleContext::default(),
            &marketplace_context()
        )
        .is_none());
    }

    proptest! {
        #[test]
        fn prop_confidence_stays_clamped(diff in 0.0f64..10_000.0, prior in any::<bool>()) {
            for source in ["marketplace", "manual", "spreadsheet"] {
                let c = confidence(source, diff, prior);
                prop_assert!((0.1..=1.0).contains(&c));
            }
        }

        #[test]
        fn prop_impact_stays_clamped(
            diff in 0.0f64..100_000.0,
            price in 0.0f64..10_000.0,
        ) {
            for severity in [Severity::Low, Severity::Medium, Severity::High, Severity::Critical] {
                let unit_price = Decimal::from_f64_retain(price);
                let score = impact_score(severity, diff, unit_price);
                prop_assert!((0.0..=10.0).contains(&score));
            }
        }

        #[test]
        fn prop_quantity_draft_requires_real_difference(src in 0i64..1000, tgt in 0i64..1000) {
            let draft = analyze_quantity(
                src,
                tgt,
                &[],
                &RuleContext::default(),
                &marketplace_context(),
            );
            prop_assert_eq!(draft.is_some(), src != tgt);
        }
    }
}
