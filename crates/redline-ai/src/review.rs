//! End-to-end contract review: segment, match, classify, escalate, flag.

use redline_core::{
    AnalysisOrigin, Assessment, ClauseSource, Flag, MatchStrength, Paragraph, ReviewSummary, Rule,
    Thresholds, TriggeredRule, segment, summarize,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::escalate::{AnalysisMode, Escalator};
use crate::heuristic::classify;
use crate::matcher::{ClauseMatch, match_clauses};
use crate::provider::{EmbedError, EmbeddingProvider};
use crate::rules::{RuleIndex, RuleMatch, adjust_specificity};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("no clauses found in the input document")]
    NoInputClauses,

    #[error("no clauses found in the reference document")]
    NoReferenceClauses,

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),
}

/// Counts describing how a review was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub input_clauses: usize,
    pub reference_clauses: usize,
    pub rules_loaded: usize,
    pub analysis_mode: AnalysisMode,
    pub embedding_model: String,
    pub escalations: usize,
    pub escalation_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub flags: Vec<Flag>,
    pub summary: ReviewSummary,
    pub stats: ReviewStats,
}

/// Runs reviews with one embedding provider and threshold set.
pub struct Reviewer<P> {
    provider: P,
    thresholds: Thresholds,
    mode: AnalysisMode,
    escalator: Option<Box<dyn Escalator>>,
}

impl<P: EmbeddingProvider> Reviewer<P> {
    /// Heuristic-only reviewer with default thresholds.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            thresholds: Thresholds::default(),
            mode: AnalysisMode::Heuristic,
            escalator: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_escalation(mut self, mode: AnalysisMode, escalator: Box<dyn Escalator>) -> Self {
        self.mode = mode;
        self.escalator = Some(escalator);
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Analysis mode actually applied: without an escalator every mode
    /// degrades to heuristic.
    pub fn mode(&self) -> AnalysisMode {
        if self.escalator.is_some() {
            self.mode
        } else {
            AnalysisMode::Heuristic
        }
    }

    /// Review `input` against the `reference` playbook and the rulebook.
    ///
    /// Embedding failures abort the review. Escalation failures do not: the
    /// heuristic assessment is kept and the reason recorded on the flag.
    pub async fn review(
        &mut self,
        input: &[Paragraph],
        reference: &[Paragraph],
        rules: &[Rule],
    ) -> Result<Review, ReviewError> {
        let inputs = segment(input, ClauseSource::Input);
        if inputs.is_empty() {
            return Err(ReviewError::NoInputClauses);
        }
        let references = segment(reference, ClauseSource::Reference);
        if references.is_empty() {
            return Err(ReviewError::NoReferenceClauses);
        }
        if rules.is_empty() {
            warn!("rulebook is empty, clauses will only be checked against the playbook");
        }
        info!(
            input = inputs.len(),
            reference = references.len(),
            rules = rules.len(),
            "segmented documents"
        );

        let t = self.thresholds;
        let (matches, input_vecs) = match_clauses(&mut self.provider, &inputs, &references, &t)?;

        // Specificity needs trigger counts over the whole document.
        let index = RuleIndex::build(&mut self.provider, rules)?;
        let rule_matches = adjust_specificity(index.match_all(&inputs, &input_vecs, &t), &t);

        let mode = self.mode();
        let mut escalations = 0;
        let mut escalation_failures = 0;
        let mut flags = Vec::with_capacity(matches.len());

        for (n, (m, crules)) in matches.iter().zip(&rule_matches).enumerate() {
            let heuristic = classify(m.similarity, m.strength, crules, &t);

            let (assessment, origin, escalation_error) = match &self.escalator {
                Some(escalator) if mode.should_escalate(&heuristic, crules) => {
                    escalations += 1;
                    match escalator.escalate(m, crules).await {
                        Ok(a) => (a, AnalysisOrigin::Llm, None),
                        Err(e) => {
                            escalation_failures += 1;
                            warn!(clause = %m.input.id, error = %e, "escalation failed, using heuristic");
                            (heuristic, AnalysisOrigin::Heuristic, Some(e.to_string()))
                        }
                    }
                }
                _ => (heuristic, AnalysisOrigin::Heuristic, None),
            };

            flags.push(build_flag(n + 1, m, crules, assessment, origin, escalation_error));
        }

        let summary = summarize(&flags);
        info!(
            flags = flags.len(),
            high_risk = summary.high_risk_count,
            escalations,
            escalation_failures,
            "review complete"
        );

        Ok(Review {
            flags,
            summary,
            stats: ReviewStats {
                input_clauses: inputs.len(),
                reference_clauses: references.len(),
                rules_loaded: rules.len(),
                analysis_mode: mode,
                embedding_model: self.provider.name().to_string(),
                escalations,
                escalation_failures,
            },
        })
    }
}

fn round4(v: f32) -> f32 {
    (v * 10_000.0).round() / 10_000.0
}

/// Assemble the flag for the `n`th input clause (1-based).
pub fn build_flag(
    n: usize,
    m: &ClauseMatch<'_>,
    rules: &[RuleMatch<'_>],
    assessment: Assessment,
    analysis: AnalysisOrigin,
    escalation_error: Option<String>,
) -> Flag {
    let reference = match m.strength {
        MatchStrength::New => None,
        _ => m.reference,
    };
    Flag {
        flag_id: format!("FLAG_{n:03}"),
        input_clause_id: m.input.id.clone(),
        section: m.input.section.clone(),
        input_text: m.input.text.clone(),
        raw_text: m.input.raw_text.clone(),
        start_offset: m.input.start_offset,
        end_offset: m.input.end_offset,
        matched_reference_id: reference.map(|c| c.id.clone()),
        matched_reference_text: reference.map(|c| c.text.clone()),
        similarity: round4(m.similarity),
        match_strength: m.strength,
        triggered_rules: rules
            .iter()
            .map(|r| TriggeredRule {
                rule_id: r.rule.rule_id.clone(),
                source: r.rule.source,
                clause_label: r.rule.clause_label.clone(),
                severity: r.rule.severity,
                match_score: round4(r.adjusted_score),
            })
            .collect(),
        classification: assessment.classification,
        risk_level: assessment.risk_level,
        confidence: assessment.confidence,
        explanation: assessment.explanation,
        suggested_redline: assessment.suggested_redline,
        analysis,
        escalation_error,
    }
}
