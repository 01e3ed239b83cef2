//! Escalation of clause assessments to an external reviewer (usually an LLM).
//!
//! The heuristic assessment is always computed first. An [`Escalator`] may
//! replace it, depending on the [`AnalysisMode`]; when escalation fails the
//! heuristic result stands and the failure is recorded on the flag.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use redline_core::{Assessment, Classification, MatchStrength, Severity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matcher::ClauseMatch;
use crate::rules::RuleMatch;

#[derive(Debug, Error)]
pub enum EscalationError {
    #[cfg(feature = "llm")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produces an assessment for a clause from its match and applicable rules.
#[async_trait]
pub trait Escalator: Send + Sync {
    /// Model or service name, recorded in review metadata.
    fn name(&self) -> &str;

    async fn escalate(
        &self,
        clause_match: &ClauseMatch<'_>,
        rules: &[RuleMatch<'_>],
    ) -> Result<Assessment, EscalationError>;
}

/// When to call the escalator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Never escalate.
    Heuristic,
    /// Escalate every clause.
    Llm,
    /// Escalate unless the heuristic says compliant and no rules matched.
    #[default]
    Hybrid,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Llm => "llm",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn should_escalate(&self, heuristic: &Assessment, rules: &[RuleMatch<'_>]) -> bool {
        match self {
            Self::Heuristic => false,
            Self::Llm => true,
            Self::Hybrid => {
                !(heuristic.classification == Classification::Compliant && rules.is_empty())
            }
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "llm" => Ok(Self::Llm),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!(
                "unknown analysis mode {other:?} (expected heuristic, llm, or hybrid)"
            )),
        }
    }
}

/// Prompt asking a reviewer model to assess one clause.
pub fn build_prompt(clause_match: &ClauseMatch<'_>, rules: &[RuleMatch<'_>]) -> String {
    let sim = clause_match.similarity;
    let strength = clause_match.strength;

    let reference_block = match (strength, clause_match.reference) {
        (MatchStrength::Strong | MatchStrength::Partial, Some(reference)) => format!(
            "MATCHED PLAYBOOK CLAUSE (organisation standard):\n\"{}\"\nSimilarity: {sim:.2} ({} match)",
            reference.text,
            strength.as_str()
        ),
        _ => format!(
            "NO MATCHING PLAYBOOK CLAUSE (similarity: {sim:.2})\n\
             This is a NEW obligation not in the organisation's standard DPA."
        ),
    };

    let mut rules_block = String::new();
    if !rules.is_empty() {
        rules_block.push_str("\n\nAPPLICABLE RULES FROM INTERNAL RULEBOOK:\n");
        for m in rules {
            let r = m.rule;
            rules_block.push_str(&format!(
                "\n- [{}] {} (Risk: {})\n  Condition: {}\n  Required: {}\n",
                r.rule_id,
                r.clause_label,
                r.severity.as_str(),
                r.trigger_condition,
                r.suggested_response
            ));
        }
    }

    format!(
        "You are a legal analyst reviewing a Data Processing Agreement on behalf of the data processor.\n\
         The incoming DPA is from a customer (the data controller).\n\n\
         Analyze this clause and determine compliance with the playbook and internal rules.\n\n\
         INCOMING CLAUSE:\n\"{}\"\n\n\
         {reference_block}{rules_block}\n\n\
         Classify as: \"compliant\" / \"deviation_minor\" / \"deviation_major\" / \"non_compliant\"\n\
         Risk: \"High\" / \"Medium\" / \"Low\"\n\
         Confidence: a float 0.0-1.0 indicating how confident you are in this assessment.\n\n\
         Respond ONLY with this JSON (no markdown fences):\n\
         {{\"classification\": \"...\", \"risk_level\": \"...\", \"explanation\": \"...\", \"suggested_redline\": \"...\", \"confidence\": 0.0}}",
        clause_match.input.text
    )
}

const DEFAULT_CONFIDENCE: f32 = 0.5;

#[derive(Deserialize)]
struct LooseAssessment {
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    risk_level: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    suggested_redline: Option<String>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
}

/// Parse a model reply into an assessment.
///
/// Markdown code fences are stripped. Unknown classifications become
/// `compliant`, unknown risks `Low`; a missing or unparseable confidence
/// becomes 0.5, and any confidence is clamped to `[0, 1]`.
pub fn parse_assessment(reply: &str) -> Result<Assessment, EscalationError> {
    let body = strip_fences(reply);
    if body.is_empty() {
        return Err(EscalationError::Malformed("empty reply".into()));
    }
    let loose: LooseAssessment = serde_json::from_str(body)?;

    let confidence = match &loose.confidence {
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|v| v as f32),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
    .filter(|c| c.is_finite())
    .unwrap_or(DEFAULT_CONFIDENCE)
    .clamp(0.0, 1.0);

    Ok(Assessment {
        classification: Classification::parse_lenient(loose.classification.as_deref().unwrap_or("")),
        risk_level: Severity::parse_lenient(loose.risk_level.as_deref().unwrap_or("")),
        confidence,
        explanation: loose.explanation.unwrap_or_default(),
        suggested_redline: loose.suggested_redline.unwrap_or_default(),
    })
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if present.
fn strip_fences(reply: &str) -> &str {
    let text = reply.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string line (e.g. "json").
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => "",
    };
    match rest.rfind("```") {
        Some(i) => rest[..i].trim(),
        None => rest.trim(),
    }
}
