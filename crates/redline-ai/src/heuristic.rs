//! Deterministic clause classifier.
//!
//! Combines the reference match strength with the rules a clause triggers.
//! Only rules whose raw score exceeds the strong-rule cutoff count towards
//! the decision; weaker matches still appear on the flag but never change
//! the classification.

use redline_core::{Assessment, Classification, MatchStrength, Severity, Thresholds};

use crate::rules::RuleMatch;

/// Classify one clause. Total: every input yields an assessment.
///
/// `rule_matches` must already be specificity-adjusted and sorted.
pub fn classify(
    similarity: f32,
    strength: MatchStrength,
    rule_matches: &[RuleMatch<'_>],
    thresholds: &Thresholds,
) -> Assessment {
    let strong: Vec<&RuleMatch<'_>> = rule_matches
        .iter()
        .filter(|m| m.raw_score > thresholds.strong_rule)
        .collect();
    let confidence = confidence(similarity, &strong);

    if strong.is_empty() {
        let explanation = match strength {
            MatchStrength::Strong => format!("Matches reference standard (sim={similarity:.2})."),
            MatchStrength::Partial => {
                format!("Partial match (sim={similarity:.2}). No policy rules triggered.")
            }
            MatchStrength::New => {
                format!("New clause (sim={similarity:.2}). No policy rules triggered.")
            }
        };
        return Assessment {
            classification: Classification::Compliant,
            risk_level: Severity::Low,
            confidence,
            explanation,
            suggested_redline: String::new(),
        };
    }

    let max_risk = strong
        .iter()
        .map(|m| m.rule.severity)
        .max()
        .unwrap_or(Severity::Low);
    let rule_ids = strong
        .iter()
        .map(|m| m.rule.rule_id.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let (classification, explanation) = match strength {
        MatchStrength::Strong => (
            Classification::DeviationMinor,
            format!("Matches standard (sim={similarity:.2}) but triggers rules: {rule_ids}."),
        ),
        MatchStrength::Partial => (
            by_risk(max_risk),
            format!("Partial match (sim={similarity:.2}). Triggered: {rule_ids}."),
        ),
        MatchStrength::New => (
            by_risk(max_risk),
            format!(
                "New clause not in reference standard (sim={similarity:.2}). Triggered: {rule_ids}."
            ),
        ),
    };

    Assessment {
        classification,
        risk_level: max_risk,
        confidence,
        explanation,
        suggested_redline: strong[0].rule.suggested_response.clone(),
    }
}

fn by_risk(risk: Severity) -> Classification {
    if risk == Severity::High {
        Classification::DeviationMajor
    } else {
        Classification::DeviationMinor
    }
}

/// `0.4·(1 − sim) + 0.4·mean(adjusted) + 0.2·min(n/3, 1)`, clamped to
/// `[0, 1]` and rounded to three decimals.
fn confidence(similarity: f32, strong: &[&RuleMatch<'_>]) -> f32 {
    let n = strong.len() as f32;
    let mean = if strong.is_empty() {
        0.0
    } else {
        strong.iter().map(|m| m.adjusted_score).sum::<f32>() / n
    };
    let raw = 0.4 * (1.0 - similarity) + 0.4 * mean + 0.2 * (n / 3.0).min(1.0);
    (raw.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}
