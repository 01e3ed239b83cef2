//! Review records shared by the segmenter, matchers, store, and CLI.

use serde::{Deserialize, Serialize};

use crate::{CoreError, Thresholds};

/// A paragraph of source text with its character span in the document.
///
/// Offsets are opaque to the pipeline and passed through for anchoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Paragraph {
    pub fn new(text: impl Into<String>, start_offset: usize, end_offset: usize) -> Self {
        Self {
            text: text.into(),
            start_offset,
            end_offset,
        }
    }
}

/// Which document a clause was segmented from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClauseSource {
    /// The incoming contract under review.
    Input,
    /// The playbook contract used as the baseline.
    Reference,
}

impl ClauseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Reference => "reference",
        }
    }
}

/// A substantive unit of contract text produced by [`segment`](crate::segment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// `{source}_{n}`, 1-based within one source document.
    pub id: String,
    /// Merged clause body (first paragraph plus absorbed continuations).
    pub text: String,
    /// Nearest enclosing section header, empty when none was seen.
    pub section: String,
    pub source: ClauseSource,
    /// Start of the first constituent paragraph.
    pub start_offset: usize,
    /// End of the last absorbed paragraph.
    pub end_offset: usize,
    /// Unprocessed text of the first paragraph, for exact-text lookups.
    pub raw_text: String,
}

/// Reviewing team that owns a rulebook entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    Legal,
    Infosec,
}

impl RuleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legal => "legal",
            Self::Infosec => "infosec",
        }
    }

    /// Team discriminator from a workbook sheet name.
    pub fn from_sheet_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("legal") {
            Some(Self::Legal)
        } else if lower.contains("infosec") {
            Some(Self::Infosec)
        } else {
            None
        }
    }
}

/// Risk severity. Ordered so that `max()` yields the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Parse the leading word of a severity cell (`"High"`, `"medium risk"`, `"LOW"`).
    pub fn parse(s: &str) -> Option<Self> {
        let word = s
            .trim()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match word.as_str() {
            "high" | "critical" => Some(Self::High),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Like [`parse`](Self::parse) but unknown values fall back to `Low`.
    pub fn parse_lenient(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Low)
    }
}

/// A rulebook red-flag condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord")]
pub struct Rule {
    /// `{source}_{n}`, unique across the rulebook.
    pub rule_id: String,
    pub source: RuleSource,
    /// Topic label; may repeat across rows of the same clause group.
    pub clause_label: String,
    pub trigger_condition: String,
    pub severity: Severity,
    pub suggested_response: String,
}

impl Rule {
    pub fn new(
        rule_id: impl Into<String>,
        source: RuleSource,
        clause_label: impl Into<String>,
        trigger_condition: impl Into<String>,
        severity: Severity,
        suggested_response: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let rule = Self {
            rule_id: rule_id.into(),
            source,
            clause_label: clause_label.into(),
            trigger_condition: trigger_condition.into(),
            severity,
            suggested_response: suggested_response.into(),
        };
        if rule.rule_id.trim().is_empty() {
            return Err(CoreError::InvalidRule {
                rule_id: rule.rule_id,
                reason: "empty rule id".into(),
            });
        }
        if rule.suggested_response.trim().is_empty() {
            return Err(CoreError::InvalidRule {
                rule_id: rule.rule_id,
                reason: "empty suggested response".into(),
            });
        }
        Ok(rule)
    }

    /// Text embedded for rule matching: `"{clause_label}: {trigger_condition}"`.
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.clause_label, self.trigger_condition)
    }
}

/// Wire form of [`Rule`]; deserialised rules go through [`Rule::new`].
#[derive(Deserialize)]
struct RuleRecord {
    rule_id: String,
    source: RuleSource,
    clause_label: String,
    trigger_condition: String,
    severity: Severity,
    suggested_response: String,
}

impl TryFrom<RuleRecord> for Rule {
    type Error = CoreError;

    fn try_from(r: RuleRecord) -> Result<Self, Self::Error> {
        Rule::new(
            r.rule_id,
            r.source,
            r.clause_label,
            r.trigger_condition,
            r.severity,
            r.suggested_response,
        )
    }
}

/// How closely an input clause resembles its nearest reference clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrength {
    Strong,
    Partial,
    /// No playbook counterpart exists.
    New,
}

impl MatchStrength {
    pub fn from_similarity(similarity: f32, thresholds: &Thresholds) -> Self {
        if similarity >= thresholds.strong_match {
            Self::Strong
        } else if similarity >= thresholds.partial_match {
            Self::Partial
        } else {
            Self::New
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Partial => "partial",
            Self::New => "new",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Compliant,
    DeviationMinor,
    DeviationMajor,
    NonCompliant,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::DeviationMinor => "deviation_minor",
            Self::DeviationMajor => "deviation_major",
            Self::NonCompliant => "non_compliant",
        }
    }

    /// Unknown values fall back to `Compliant`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "deviation_minor" => Self::DeviationMinor,
            "deviation_major" => Self::DeviationMajor,
            "non_compliant" => Self::NonCompliant,
            _ => Self::Compliant,
        }
    }

    /// Sort rank, most serious first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::NonCompliant => 0,
            Self::DeviationMajor => 1,
            Self::DeviationMinor => 2,
            Self::Compliant => 3,
        }
    }
}

/// Outcome of classifying one clause, from the heuristic or an escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub classification: Classification,
    pub risk_level: Severity,
    /// Within `[0, 1]`.
    pub confidence: f32,
    pub explanation: String,
    pub suggested_redline: String,
}

/// Which classifier produced a flag's assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisOrigin {
    Heuristic,
    Llm,
}

/// A rule that contributed to a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: String,
    pub source: RuleSource,
    pub clause_label: String,
    pub severity: Severity,
    /// Specificity-adjusted score.
    pub match_score: f32,
}

/// Final per-clause finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    /// `FLAG_{nnn}`, 1-based.
    pub flag_id: String,
    pub input_clause_id: String,
    pub section: String,
    pub input_text: String,
    pub raw_text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// Absent when the match strength is `new`.
    pub matched_reference_id: Option<String>,
    pub matched_reference_text: Option<String>,
    pub similarity: f32,
    pub match_strength: MatchStrength,
    pub triggered_rules: Vec<TriggeredRule>,
    pub classification: Classification,
    pub risk_level: Severity,
    pub confidence: f32,
    pub explanation: String,
    pub suggested_redline: String,
    pub analysis: AnalysisOrigin,
    /// Why escalation failed, when the heuristic result was used as fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_error: Option<String>,
}

impl Flag {
    pub fn is_compliant(&self) -> bool {
        self.classification == Classification::Compliant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_risk() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        let max = [Severity::Low, Severity::High, Severity::Medium]
            .into_iter()
            .max();
        assert_eq!(max, Some(Severity::High));
    }

    #[test]
    fn severity_parse_leading_word() {
        assert_eq!(Severity::parse("High"), Some(Severity::High));
        assert_eq!(Severity::parse(" medium risk"), Some(Severity::Medium));
        assert_eq!(Severity::parse("LOW"), Some(Severity::Low));
        assert_eq!(Severity::parse("None"), None);
        assert_eq!(Severity::parse_lenient("unknown"), Severity::Low);
    }

    #[test]
    fn classification_lenient_defaults_to_compliant() {
        assert_eq!(
            Classification::parse_lenient("deviation_major"),
            Classification::DeviationMajor
        );
        assert_eq!(
            Classification::parse_lenient("Non-Compliant"),
            Classification::NonCompliant
        );
        assert_eq!(
            Classification::parse_lenient("weird"),
            Classification::Compliant
        );
    }

    #[test]
    fn rule_requires_response() {
        let err = Rule::new(
            "legal_1",
            RuleSource::Legal,
            "Audit",
            "Unlimited audits",
            Severity::High,
            "  ",
        );
        assert!(matches!(err, Err(CoreError::InvalidRule { .. })));
    }

    #[test]
    fn rule_embedding_text_joins_label_and_trigger() {
        let rule = Rule::new(
            "infosec_2",
            RuleSource::Infosec,
            "Breach Notification",
            "Notification within 24 hours",
            Severity::Medium,
            "Request 72 hours",
        )
        .unwrap();
        assert_eq!(
            rule.embedding_text(),
            "Breach Notification: Notification within 24 hours"
        );
    }

    #[test]
    fn match_strength_boundaries() {
        let t = Thresholds::default();
        assert_eq!(MatchStrength::from_similarity(0.70, &t), MatchStrength::Strong);
        assert_eq!(MatchStrength::from_similarity(0.69, &t), MatchStrength::Partial);
        assert_eq!(MatchStrength::from_similarity(0.45, &t), MatchStrength::Partial);
        assert_eq!(MatchStrength::from_similarity(0.44, &t), MatchStrength::New);
    }

    #[test]
    fn raising_strong_threshold_never_promotes() {
        let sims = [0.1f32, 0.45, 0.6, 0.7, 0.75, 0.9, 1.0];
        let low = Thresholds::default();
        let high = Thresholds {
            strong_match: 0.8,
            ..Thresholds::default()
        };
        for sim in sims {
            let before = MatchStrength::from_similarity(sim, &low);
            let after = MatchStrength::from_similarity(sim, &high);
            if before != after {
                assert_eq!(before, MatchStrength::Strong, "sim {sim}");
                assert_eq!(after, MatchStrength::Partial, "sim {sim}");
            }
        }
    }

    #[test]
    fn flag_enums_use_wire_names() {
        assert_eq!(
            serde_json::to_string(&Classification::DeviationMinor).unwrap(),
            "\"deviation_minor\""
        );
        assert_eq!(serde_json::to_string(&MatchStrength::New).unwrap(), "\"new\"");
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"High\"");
        assert_eq!(serde_json::to_string(&RuleSource::Infosec).unwrap(), "\"infosec\"");
    }

    #[test]
    fn deserialised_rules_are_validated() {
        let ok: Rule = serde_json::from_str(
            r#"{"rule_id":"legal_1","source":"legal","clause_label":"Audit",
                "trigger_condition":"No audit right","severity":"High",
                "suggested_response":"Insert annual audit right"}"#,
        )
        .unwrap();
        assert_eq!(ok.rule_id, "legal_1");

        let missing_response = serde_json::from_str::<Rule>(
            r#"{"rule_id":"legal_2","source":"legal","clause_label":"Audit",
                "trigger_condition":"No audit right","severity":"High",
                "suggested_response":"  "}"#,
        );
        assert!(missing_response.is_err());

        let missing_id = serde_json::from_str::<Rule>(
            r#"{"rule_id":"","source":"infosec","clause_label":"Audit",
                "trigger_condition":"t","severity":"Low","suggested_response":"r"}"#,
        );
        assert!(missing_id.is_err());
    }
}
