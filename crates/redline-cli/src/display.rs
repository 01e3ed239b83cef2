//! Terminal rendering for reviews, review history, and feedback statistics.

use std::fmt::Write;

use redline_ai::Review;
use redline_core::ReviewSummary;
use redline_store::{FlagAction, PortfolioStats, ReviewListing, RuleEffectiveness};

const MAX_TEXT: usize = 72;

// ── Reviews ──

/// A completed review as a card: summary counts, top risks, and run stats.
pub fn render_review(contract: &str, review: &Review) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {contract} ===");
    let _ = writeln!(out);
    render_summary(&mut out, &review.summary);

    let s = &review.stats;
    let _ = writeln!(out, "Run");
    row(&mut out, "analysis_mode", s.analysis_mode);
    row(&mut out, "embedding_model", &s.embedding_model);
    row(&mut out, "input_clauses", s.input_clauses);
    row(&mut out, "reference_clauses", s.reference_clauses);
    row(&mut out, "rules_loaded", s.rules_loaded);
    if s.escalations > 0 {
        row(&mut out, "escalations", s.escalations);
        row(&mut out, "escalation_failures", s.escalation_failures);
    }
    out
}

fn render_summary(out: &mut String, summary: &ReviewSummary) {
    let _ = writeln!(out, "Summary");
    row(out, "total_clauses", summary.total_clauses_analyzed);
    row(out, "high_risk", summary.high_risk_count);
    row(out, "non_compliant", summary.non_compliant_count);
    for (class, n) in &summary.classification_breakdown {
        row(out, class, n);
    }
    let _ = writeln!(out);

    if summary.top_risks.is_empty() {
        return;
    }
    let _ = writeln!(out, "Top Risks");
    for r in &summary.top_risks {
        let section = if r.section.is_empty() { "-" } else { &r.section };
        let _ = writeln!(
            out,
            "  {} [{:<6}] {:<16} {}",
            r.flag_id,
            r.risk.as_str(),
            r.classification.as_str(),
            section
        );
        let _ = writeln!(out, "           {}", truncate(&r.summary, MAX_TEXT));
    }
    let _ = writeln!(out);
}

// ── History ──

pub fn render_listing(reviews: &[ReviewListing]) -> String {
    if reviews.is_empty() {
        return "No reviews saved.\n".into();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:<25}  {:<10}  {:<10}  {:<9}  contract",
        "id", "date", "reviewer", "status", "mode"
    );
    for r in reviews {
        let _ = writeln!(
            out,
            "{:>5}  {:<25}  {:<10}  {:<10}  {:<9}  {}",
            r.id,
            r.date,
            truncate(&r.reviewer, 10),
            r.status,
            r.analysis_mode,
            r.contract_name
        );
    }
    out
}

pub fn render_flag_actions(actions: &[FlagAction]) -> String {
    let mut out = String::new();
    for a in actions {
        let _ = writeln!(
            out,
            "  {:<9} {:<16} {:<6} {:.2}  {:<8} {}",
            a.flag_id,
            a.classification.as_str(),
            a.risk_level.as_str(),
            a.confidence,
            a.action.as_str(),
            a.note
        );
    }
    out
}

// ── Statistics ──

pub fn render_stats(stats: &PortfolioStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Portfolio");
    row(&mut out, "total_reviews", stats.total_reviews);
    row(&mut out, "avg_flags_per_contract", stats.avg_flags_per_contract);
    if !stats.common_deviations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Common Deviations");
        for (class, n) in &stats.common_deviations {
            row(&mut out, class, n);
        }
    }
    out
}

pub fn render_rule_effectiveness(rules: &[RuleEffectiveness]) -> String {
    if rules.is_empty() {
        return "No rules have triggered yet.\n".into();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:>9} {:>8} {:>8} {:>6}  label",
        "rule", "triggered", "accepted", "rejected", "fp"
    );
    for r in rules {
        let _ = writeln!(
            out,
            "{:<12} {:>9} {:>8} {:>8} {:>6.2}  {}",
            r.rule_id,
            r.triggered,
            r.accepted,
            r.rejected,
            r.false_positive_rate,
            truncate(&r.clause_label, 40)
        );
    }
    out
}

// ── Helpers ──

fn row(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "  {label:<26} {value}");
}

/// Cut `text` to at most `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
