//! Matching and classification thresholds.
//!
//! Every threshold is independently tunable. The keyword boost and the
//! strong-rule cutoff are deliberately not derived from the similarity
//! thresholds.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Tunable constants for the matching pipeline.
///
/// Deserialises from a partial JSON object: omitted fields keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Clause similarity at or above this is a `strong` match.
    pub strong_match: f32,
    /// Clause similarity at or above this (and below `strong_match`) is `partial`.
    pub partial_match: f32,
    /// Minimum rule score, applied both before and after specificity adjustment.
    pub rule_match: f32,
    /// Added to a rule score when the clause shares two or more label keywords.
    pub keyword_boost: f32,
    /// Raw rule score a rule must exceed to count in the heuristic decision.
    pub strong_rule: f32,
    /// Rules kept per clause after specificity adjustment.
    pub max_rules_per_clause: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            strong_match: 0.70,
            partial_match: 0.45,
            rule_match: 0.58,
            keyword_boost: 0.08,
            strong_rule: 0.62,
            max_rules_per_clause: 5,
        }
    }
}

impl Thresholds {
    /// Load thresholds from a JSON file, validating the result.
    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        let thresholds: Self = serde_json::from_str(&text)?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let unit = [
            ("strong_match", self.strong_match),
            ("partial_match", self.partial_match),
            ("rule_match", self.rule_match),
            ("keyword_boost", self.keyword_boost),
            ("strong_rule", self.strong_rule),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::InvalidThresholds(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.partial_match > self.strong_match {
            return Err(CoreError::InvalidThresholds(format!(
                "partial_match ({}) exceeds strong_match ({})",
                self.partial_match, self.strong_match
            )));
        }
        if self.max_rules_per_clause == 0 {
            return Err(CoreError::InvalidThresholds(
                "max_rules_per_clause must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
