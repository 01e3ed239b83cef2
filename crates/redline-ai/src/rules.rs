//! Rulebook matching and document-wide specificity adjustment.
//!
//! A clause triggers a rule when the cosine similarity between the clause
//! and the rule text (`"{clause_label}: {trigger_condition}"`), plus a small
//! boost for shared topic keywords, reaches the rule threshold. Rules that
//! fire across much of a document are generic and get damped afterwards by
//! [`adjust_specificity`].

use std::collections::{HashMap, HashSet};

use redline_core::{Clause, Rule, Thresholds};
use tracing::debug;

use crate::provider::{EmbedError, EmbeddingProvider, encode_exact};
use crate::similarity::cosine;

/// Minimum keyword overlap for the boost to apply.
const MIN_KEYWORD_OVERLAP: usize = 2;
const MIN_KEYWORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch<'a> {
    pub rule: &'a Rule,
    /// Cosine similarity plus keyword boost, before specificity damping.
    pub raw_score: f32,
    /// Equal to `raw_score` until [`adjust_specificity`] runs.
    pub adjusted_score: f32,
}

/// Lowercase ASCII alphabetic runs of at least four letters.
pub fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_lowercase())
        .filter(|w| w.len() >= MIN_KEYWORD_LEN)
        .map(str::to_string)
        .collect()
}

/// Rules with their embeddings and label keywords, built once per run.
pub struct RuleIndex<'a> {
    rules: &'a [Rule],
    vectors: Vec<Vec<f32>>,
    label_keywords: Vec<HashSet<String>>,
}

impl<'a> RuleIndex<'a> {
    /// Embed every rule text in one batch.
    pub fn build<P: EmbeddingProvider + ?Sized>(
        provider: &mut P,
        rules: &'a [Rule],
    ) -> Result<Self, EmbedError> {
        let texts: Vec<String> = rules.iter().map(Rule::embedding_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = encode_exact(provider, &refs)?;
        Ok(Self::from_vectors(rules, vectors))
    }

    /// Index rules with precomputed embeddings, parallel to `rules`.
    pub fn from_vectors(rules: &'a [Rule], vectors: Vec<Vec<f32>>) -> Self {
        let label_keywords = rules.iter().map(|r| keywords(&r.clause_label)).collect();
        Self {
            rules,
            vectors,
            label_keywords,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules scoring at or above the rule threshold for one clause,
    /// sorted by descending score. Not capped.
    pub fn match_clause(
        &self,
        clause: &Clause,
        clause_vec: &[f32],
        thresholds: &Thresholds,
    ) -> Vec<RuleMatch<'a>> {
        let clause_words = keywords(&clause.text);

        let mut matched: Vec<RuleMatch<'a>> = self
            .rules
            .iter()
            .zip(&self.vectors)
            .zip(&self.label_keywords)
            .filter_map(|((rule, rule_vec), label_words)| {
                let mut score = cosine(clause_vec, rule_vec);
                if label_words.intersection(&clause_words).count() >= MIN_KEYWORD_OVERLAP {
                    score = (score + thresholds.keyword_boost).min(1.0);
                }
                (score >= thresholds.rule_match).then_some(RuleMatch {
                    rule,
                    raw_score: score,
                    adjusted_score: score,
                })
            })
            .collect();

        sort_desc(&mut matched, |m| m.raw_score);
        matched
    }

    /// Rule matches for every clause, parallel to `clauses`.
    pub fn match_all(
        &self,
        clauses: &[Clause],
        clause_vecs: &[Vec<f32>],
        thresholds: &Thresholds,
    ) -> Vec<Vec<RuleMatch<'a>>> {
        clauses
            .iter()
            .zip(clause_vecs)
            .map(|(clause, vec)| self.match_clause(clause, vec, thresholds))
            .collect()
    }
}

/// Damp rules by how many clauses of the document they fired on.
///
/// `adjusted = raw / ln(1 + count)`, where `count` is the number of clauses
/// the rule appeared in. Matches falling below the rule threshold are
/// dropped; the rest are re-sorted and truncated to
/// `max_rules_per_clause`. Must run over the whole document at once.
pub fn adjust_specificity<'a>(
    per_clause: Vec<Vec<RuleMatch<'a>>>,
    thresholds: &Thresholds,
) -> Vec<Vec<RuleMatch<'a>>> {
    let mut trigger_counts: HashMap<&str, usize> = HashMap::new();
    for matches in &per_clause {
        for m in matches {
            *trigger_counts.entry(m.rule.rule_id.as_str()).or_default() += 1;
        }
    }

    let mut dropped = 0usize;
    let adjusted = per_clause
        .iter()
        .map(|matches| {
            let mut kept: Vec<RuleMatch<'a>> = matches
                .iter()
                .filter_map(|m| {
                    let count = trigger_counts
                        .get(m.rule.rule_id.as_str())
                        .copied()
                        .unwrap_or(1);
                    let adjusted_score = m.raw_score / (1.0 + count as f32).ln();
                    if adjusted_score >= thresholds.rule_match {
                        Some(RuleMatch {
                            adjusted_score,
                            ..m.clone()
                        })
                    } else {
                        dropped += 1;
                        None
                    }
                })
                .collect();
            sort_desc(&mut kept, |m| m.adjusted_score);
            kept.truncate(thresholds.max_rules_per_clause);
            kept
        })
        .collect();

    debug!(
        distinct_rules = trigger_counts.len(),
        dropped, "applied rule specificity"
    );
    adjusted
}

/// Stable descending sort; equal scores keep their original order.
fn sort_desc<T>(items: &mut [T], key: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_core::{ClauseSource, RuleSource, Severity};

    fn rule(n: usize, label: &str) -> Rule {
        Rule::new(
            format!("legal_{n}"),
            RuleSource::Legal,
            label,
            "trigger",
            Severity::Medium,
            "respond",
        )
        .unwrap()
    }

    fn clause(n: usize, text: &str) -> Clause {
        Clause {
            id: format!("input_{n}"),
            text: text.into(),
            section: String::new(),
            source: ClauseSource::Input,
            start_offset: 0,
            end_offset: 0,
            raw_text: text.into(),
        }
    }

    fn rm(rule: &Rule, raw: f32) -> RuleMatch<'_> {
        RuleMatch {
            rule,
            raw_score: raw,
            adjusted_score: raw,
        }
    }

    #[test]
    fn keyword_extraction() {
        let k = keywords("Sub-processor AUDIT rights, 72h; data");
        let mut v: Vec<&str> = k.iter().map(String::as_str).collect();
        v.sort();
        assert_eq!(v, vec!["audit", "data", "processor", "rights"]);
    }

    #[test]
    fn keyword_boost_lifts_score_over_threshold() {
        let rules = vec![rule(1, "Audit Rights")];
        // cos = 0.55, below 0.58 without boost.
        let rule_vec = vec![0.55, (1.0f32 - 0.55 * 0.55).sqrt()];
        let index = RuleIndex::from_vectors(&rules, vec![rule_vec]);
        let t = Thresholds::default();

        let with_overlap = clause(1, "The customer has audit rights over the processor");
        let m = index.match_clause(&with_overlap, &[1.0, 0.0], &t);
        assert_eq!(m.len(), 1);
        assert!((m[0].raw_score - 0.63).abs() < 1e-4);

        let one_word = clause(2, "The customer may audit the processor");
        assert!(index.match_clause(&one_word, &[1.0, 0.0], &t).is_empty());
    }

    #[test]
    fn boost_caps_at_one() {
        let rules = vec![rule(1, "Audit Rights")];
        let index = RuleIndex::from_vectors(&rules, vec![vec![1.0, 0.0]]);
        let c = clause(1, "audit rights apply");
        let m = index.match_clause(&c, &[1.0, 0.0], &Thresholds::default());
        assert_eq!(m[0].raw_score, 1.0);
    }

    #[test]
    fn matches_sorted_and_uncapped_before_adjustment() {
        let rules: Vec<Rule> = (1..=7).map(|n| rule(n, "Topic")).collect();
        let vecs: Vec<Vec<f32>> = (0..7)
            .map(|i| {
                let c = 0.6 + 0.05 * i as f32;
                vec![c, (1.0 - c * c).max(0.0).sqrt()]
            })
            .collect();
        let index = RuleIndex::from_vectors(&rules, vecs);
        let m = index.match_clause(&clause(1, "x"), &[1.0, 0.0], &Thresholds::default());
        assert_eq!(m.len(), 7);
        assert!(m.windows(2).all(|w| w[0].raw_score >= w[1].raw_score));
        assert_eq!(m[0].rule.rule_id, "legal_7");
    }

    #[test]
    fn generic_rule_is_suppressed() {
        // Rule fires on 50 of 60 clauses at 0.60: 0.60 / ln(51) ≈ 0.153.
        let rules = vec![rule(1, "Generic")];
        let per_clause: Vec<Vec<RuleMatch>> = (0..60)
            .map(|i| if i < 50 { vec![rm(&rules[0], 0.60)] } else { vec![] })
            .collect();
        let adjusted = adjust_specificity(per_clause, &Thresholds::default());
        assert_eq!(adjusted.len(), 60);
        assert!(adjusted.iter().all(Vec::is_empty));
        assert!((0.60 / 51f32.ln() - 0.153).abs() < 1e-3);
    }

    #[test]
    fn specific_rule_outranks_broad_rule() {
        let rules = vec![rule(1, "Specific"), rule(2, "Broad")];
        let mut per_clause = vec![vec![rm(&rules[1], 0.9), rm(&rules[0], 0.9)]];
        for _ in 0..9 {
            per_clause.push(vec![rm(&rules[1], 0.9)]);
        }
        let t = Thresholds {
            rule_match: 0.0,
            ..Thresholds::default()
        };
        let adjusted = adjust_specificity(per_clause, &t);
        let first = &adjusted[0];
        assert_eq!(first[0].rule.rule_id, "legal_1");
        assert!(first[0].adjusted_score > first[1].adjusted_score);
        assert_eq!(first[0].raw_score, 0.9);
    }

    #[test]
    fn adjusted_matches_capped_per_clause() {
        let rules: Vec<Rule> = (1..=8).map(|n| rule(n, "Topic")).collect();
        let per_clause = vec![rules.iter().map(|r| rm(r, 0.7)).collect::<Vec<_>>()];
        let t = Thresholds::default();
        let adjusted = adjust_specificity(per_clause, &t);
        assert_eq!(adjusted[0].len(), 5);
        for m in &adjusted[0] {
            assert!(m.adjusted_score >= t.rule_match);
        }
    }

    #[test]
    fn match_all_is_parallel_to_clauses() {
        let rules = vec![rule(1, "Topic")];
        let index = RuleIndex::from_vectors(&rules, vec![vec![1.0, 0.0]]);
        let clauses = vec![clause(1, "a"), clause(2, "b")];
        let out = index.match_all(&clauses, &[vec![1.0, 0.0], vec![0.0, 1.0]], &Thresholds::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 1);
        assert!(out[1].is_empty());
    }
}
