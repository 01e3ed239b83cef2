//! Review-level summary statistics over a set of flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Classification, Flag, Severity};

const TOP_RISKS: usize = 10;
const TOP_RISK_SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub total_clauses_analyzed: usize,
    /// classification wire name → count
    pub classification_breakdown: BTreeMap<String, usize>,
    /// severity name → count
    pub risk_breakdown: BTreeMap<String, usize>,
    pub high_risk_count: usize,
    pub non_compliant_count: usize,
    /// Most serious flags first, at most 10.
    pub top_risks: Vec<TopRisk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopRisk {
    pub flag_id: String,
    pub section: String,
    pub risk: Severity,
    pub classification: Classification,
    pub summary: String,
}

impl ReviewSummary {
    pub fn risk_count(&self, severity: Severity) -> usize {
        self.risk_breakdown
            .get(severity.as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn classification_count(&self, classification: Classification) -> usize {
        self.classification_breakdown
            .get(classification.as_str())
            .copied()
            .unwrap_or(0)
    }
}

/// Summarise flags. Ranking is by risk (High first), then classification
/// (non-compliant first); ties keep document order.
pub fn summarize(flags: &[Flag]) -> ReviewSummary {
    let mut classification_breakdown = BTreeMap::new();
    let mut risk_breakdown = BTreeMap::new();
    for f in flags {
        *classification_breakdown
            .entry(f.classification.as_str().to_string())
            .or_insert(0) += 1;
        *risk_breakdown
            .entry(f.risk_level.as_str().to_string())
            .or_insert(0) += 1;
    }

    let mut ranked: Vec<&Flag> = flags.iter().collect();
    ranked.sort_by_key(|f| (std::cmp::Reverse(f.risk_level), f.classification.rank()));

    let top_risks = ranked
        .into_iter()
        .take(TOP_RISKS)
        .map(|f| TopRisk {
            flag_id: f.flag_id.clone(),
            section: f.section.clone(),
            risk: f.risk_level,
            classification: f.classification,
            summary: f.explanation.chars().take(TOP_RISK_SUMMARY_CHARS).collect(),
        })
        .collect();

    ReviewSummary {
        total_clauses_analyzed: flags.len(),
        classification_breakdown,
        risk_breakdown,
        high_risk_count: flags
            .iter()
            .filter(|f| f.risk_level == Severity::High)
            .count(),
        non_compliant_count: flags
            .iter()
            .filter(|f| f.classification == Classification::NonCompliant)
            .count(),
        top_risks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisOrigin, MatchStrength};

    fn flag(n: usize, classification: Classification, risk: Severity) -> Flag {
        Flag {
            flag_id: format!("FLAG_{n:03}"),
            input_clause_id: format!("input_{n}"),
            section: String::new(),
            input_text: "text".into(),
            raw_text: "text".into(),
            start_offset: 0,
            end_offset: 4,
            matched_reference_id: None,
            matched_reference_text: None,
            similarity: 0.5,
            match_strength: MatchStrength::Partial,
            triggered_rules: vec![],
            classification,
            risk_level: risk,
            confidence: 0.5,
            explanation: "x".repeat(300),
            suggested_redline: String::new(),
            analysis: AnalysisOrigin::Heuristic,
            escalation_error: None,
        }
    }

    #[test]
    fn empty_flags() {
        let s = summarize(&[]);
        assert_eq!(s.total_clauses_analyzed, 0);
        assert!(s.top_risks.is_empty());
        assert_eq!(s.risk_count(Severity::High), 0);
    }

    #[test]
    fn counts_and_ranking() {
        let flags = vec![
            flag(1, Classification::Compliant, Severity::Low),
            flag(2, Classification::DeviationMinor, Severity::Medium),
            flag(3, Classification::DeviationMajor, Severity::High),
            flag(4, Classification::NonCompliant, Severity::High),
        ];
        let s = summarize(&flags);
        assert_eq!(s.total_clauses_analyzed, 4);
        assert_eq!(s.high_risk_count, 2);
        assert_eq!(s.non_compliant_count, 1);
        assert_eq!(s.risk_count(Severity::High), 2);
        assert_eq!(s.classification_count(Classification::Compliant), 1);

        let order: Vec<&str> = s.top_risks.iter().map(|t| t.flag_id.as_str()).collect();
        assert_eq!(order, vec!["FLAG_004", "FLAG_003", "FLAG_002", "FLAG_001"]);
        assert_eq!(s.top_risks[0].summary.chars().count(), 200);
    }

    #[test]
    fn top_risks_capped_at_ten() {
        let flags: Vec<Flag> = (1..=15)
            .map(|n| flag(n, Classification::DeviationMinor, Severity::Low))
            .collect();
        let s = summarize(&flags);
        assert_eq!(s.top_risks.len(), 10);
        assert_eq!(s.top_risks[0].flag_id, "FLAG_001");
    }
}
