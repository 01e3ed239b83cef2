//! Portfolio statistics and rule feedback over saved reviews.
//!
//! Pure functions over loaded records so they can be computed from any
//! backend and tested without a database.

use std::collections::{BTreeMap, HashMap};

use redline_core::{Classification, Flag, RuleSource};
use serde::{Deserialize, Serialize};

use crate::record::{FlagAction, ReviewAction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub total_reviews: usize,
    /// Mean number of non-compliant (any non-`compliant` class) flags per
    /// review, to one decimal place.
    pub avg_flags_per_contract: f64,
    /// classification wire name → count, over non-compliant flags only.
    pub common_deviations: BTreeMap<String, usize>,
}

pub fn portfolio_stats<'a>(reviews: impl IntoIterator<Item = &'a [Flag]>) -> PortfolioStats {
    let mut total_reviews = 0usize;
    let mut flagged = 0usize;
    let mut common_deviations = BTreeMap::new();

    for flags in reviews {
        total_reviews += 1;
        for f in flags
            .iter()
            .filter(|f| f.classification != Classification::Compliant)
        {
            flagged += 1;
            *common_deviations
                .entry(f.classification.as_str().to_string())
                .or_insert(0) += 1;
        }
    }

    let avg = if total_reviews == 0 {
        0.0
    } else {
        flagged as f64 / total_reviews as f64
    };
    PortfolioStats {
        total_reviews,
        avg_flags_per_contract: (avg * 10.0).round() / 10.0,
        common_deviations,
    }
}

/// How often reviewers agree with a rule when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEffectiveness {
    pub rule_id: String,
    pub source: RuleSource,
    pub clause_label: String,
    pub triggered: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// `rejected / (accepted + rejected)` to two decimals; 0 when no flag
    /// carrying the rule has been accepted or rejected.
    pub false_positive_rate: f64,
}

/// Per-rule trigger and feedback counts, highest false-positive rate first.
///
/// `reviews` yields `(review_id, flags)`; `actions` holds reviewer decisions
/// keyed by `(review_id, flag_id)`. Ties keep first-seen rule order.
pub fn rule_effectiveness<'a>(
    reviews: impl IntoIterator<Item = (i64, &'a [Flag])>,
    actions: &[FlagAction],
) -> Vec<RuleEffectiveness> {
    let decided: HashMap<(i64, &str), ReviewAction> = actions
        .iter()
        .filter(|a| a.action != ReviewAction::Pending)
        .map(|a| ((a.review_id, a.flag_id.as_str()), a.action))
        .collect();

    let mut out: Vec<RuleEffectiveness> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (review_id, flags) in reviews {
        for flag in flags {
            let action = decided.get(&(review_id, flag.flag_id.as_str())).copied();
            for rule in &flag.triggered_rules {
                let i = *index.entry(rule.rule_id.clone()).or_insert_with(|| {
                    out.push(RuleEffectiveness {
                        rule_id: rule.rule_id.clone(),
                        source: rule.source,
                        clause_label: rule.clause_label.clone(),
                        triggered: 0,
                        accepted: 0,
                        rejected: 0,
                        false_positive_rate: 0.0,
                    });
                    out.len() - 1
                });
                let entry = &mut out[i];
                entry.triggered += 1;
                match action {
                    Some(ReviewAction::Accepted) => entry.accepted += 1,
                    Some(ReviewAction::Rejected) => entry.rejected += 1,
                    _ => {}
                }
            }
        }
    }

    for r in &mut out {
        let decided = r.accepted + r.rejected;
        if decided > 0 {
            r.false_positive_rate = (r.rejected as f64 / decided as f64 * 100.0).round() / 100.0;
        }
    }
    out.sort_by(|a, b| b.false_positive_rate.total_cmp(&a.false_positive_rate));
    out
}
