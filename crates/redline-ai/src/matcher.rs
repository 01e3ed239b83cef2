//! Nearest-reference matching for input clauses.

use redline_core::{Clause, MatchStrength, Thresholds};
use tracing::debug;

use crate::provider::{EmbedError, EmbeddingProvider, encode_exact};
use crate::similarity::{argmax, similarity_matrix};

/// An input clause paired with its most similar reference clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseMatch<'a> {
    pub input: &'a Clause,
    /// Best reference, if any references exist. Kept even for `New`
    /// matches; consumers drop it when the strength is `New`.
    pub reference: Option<&'a Clause>,
    /// Clamped to `[0, 1]`.
    pub similarity: f32,
    pub strength: MatchStrength,
}

/// Embed both clause sets and match each input clause to its nearest reference.
///
/// Returns `(matches, input_embeddings)`; the input embeddings are reused for
/// rule matching.
pub fn match_clauses<'a, P: EmbeddingProvider + ?Sized>(
    provider: &mut P,
    inputs: &'a [Clause],
    references: &'a [Clause],
    thresholds: &Thresholds,
) -> Result<(Vec<ClauseMatch<'a>>, Vec<Vec<f32>>), EmbedError> {
    let input_texts: Vec<&str> = inputs.iter().map(|c| c.text.as_str()).collect();
    let reference_texts: Vec<&str> = references.iter().map(|c| c.text.as_str()).collect();

    let input_vecs = encode_exact(provider, &input_texts)?;
    let reference_vecs = encode_exact(provider, &reference_texts)?;

    let matches = match_embedded(inputs, &input_vecs, references, &reference_vecs, thresholds);
    Ok((matches, input_vecs))
}

/// Match pre-embedded clauses. Vectors are parallel to their clause slices.
pub fn match_embedded<'a>(
    inputs: &'a [Clause],
    input_vecs: &[Vec<f32>],
    references: &'a [Clause],
    reference_vecs: &[Vec<f32>],
    thresholds: &Thresholds,
) -> Vec<ClauseMatch<'a>> {
    let matrix = similarity_matrix(input_vecs, reference_vecs);

    let matches: Vec<ClauseMatch<'a>> = inputs
        .iter()
        .zip(&matrix)
        .map(|(input, row)| match argmax(row) {
            Some((idx, sim)) => {
                let similarity = sim.clamp(0.0, 1.0);
                ClauseMatch {
                    input,
                    reference: references.get(idx),
                    similarity,
                    strength: MatchStrength::from_similarity(similarity, thresholds),
                }
            }
            None => ClauseMatch {
                input,
                reference: None,
                similarity: 0.0,
                strength: MatchStrength::New,
            },
        })
        .collect();

    let strong = matches
        .iter()
        .filter(|m| m.strength == MatchStrength::Strong)
        .count();
    let partial = matches
        .iter()
        .filter(|m| m.strength == MatchStrength::Partial)
        .count();
    debug!(
        inputs = inputs.len(),
        references = references.len(),
        strong,
        partial,
        new = matches.len() - strong - partial,
        "matched clauses"
    );
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashingEmbedder;
    use redline_core::ClauseSource;

    fn clause(id: &str, source: ClauseSource, text: &str) -> Clause {
        Clause {
            id: id.into(),
            text: text.into(),
            section: String::new(),
            source,
            start_offset: 0,
            end_offset: text.chars().count(),
            raw_text: text.into(),
        }
    }

    #[test]
    fn one_match_per_input() {
        let inputs = vec![
            clause("input_1", ClauseSource::Input, "Processor shall notify controller of breaches"),
            clause("input_2", ClauseSource::Input, "Governing law is Ireland for this agreement"),
            clause("input_3", ClauseSource::Input, "Completely unrelated text about pizza toppings"),
        ];
        let refs = vec![
            clause("reference_1", ClauseSource::Reference, "Processor shall notify controller of breaches"),
            clause("reference_2", ClauseSource::Reference, "Governing law is Ireland for this agreement"),
        ];
        let mut p = HashingEmbedder::default();
        let (matches, vecs) = match_clauses(&mut p, &inputs, &refs, &Thresholds::default()).unwrap();

        assert_eq!(matches.len(), inputs.len());
        assert_eq!(vecs.len(), inputs.len());
        assert_eq!(matches[0].reference.map(|c| c.id.as_str()), Some("reference_1"));
        assert_eq!(matches[0].strength, MatchStrength::Strong);
        assert_eq!(matches[1].reference.map(|c| c.id.as_str()), Some("reference_2"));
        assert_eq!(matches[2].strength, MatchStrength::New);
        for m in &matches {
            assert!((0.0..=1.0).contains(&m.similarity));
        }
    }

    #[test]
    fn no_references_yields_new_matches() {
        let inputs = vec![clause("input_1", ClauseSource::Input, "Processor shall notify controller")];
        let mut p = HashingEmbedder::default();
        let (matches, _) = match_clauses(&mut p, &inputs, &[], &Thresholds::default()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].strength, MatchStrength::New);
        assert_eq!(matches[0].similarity, 0.0);
        assert!(matches[0].reference.is_none());
    }

    #[test]
    fn ties_go_to_first_reference() {
        let inputs = vec![clause("input_1", ClauseSource::Input, "a")];
        let refs = vec![
            clause("reference_1", ClauseSource::Reference, "b"),
            clause("reference_2", ClauseSource::Reference, "c"),
        ];
        let m = match_embedded(
            &inputs,
            &[vec![1.0, 0.0]],
            &refs,
            &[vec![1.0, 0.0], vec![1.0, 0.0]],
            &Thresholds::default(),
        );
        assert_eq!(m[0].reference.map(|c| c.id.as_str()), Some("reference_1"));
    }

    #[test]
    fn negative_similarity_clamps_to_zero() {
        let inputs = vec![clause("input_1", ClauseSource::Input, "a")];
        let refs = vec![clause("reference_1", ClauseSource::Reference, "b")];
        let m = match_embedded(&inputs, &[vec![1.0, 0.0]], &refs, &[vec![-1.0, 0.0]], &Thresholds::default());
        assert_eq!(m[0].similarity, 0.0);
        assert_eq!(m[0].strength, MatchStrength::New);
    }

    #[test]
    fn raising_strong_threshold_only_demotes_strong_to_partial() {
        let inputs = vec![clause("input_1", ClauseSource::Input, "a")];
        let refs = vec![clause("reference_1", ClauseSource::Reference, "b")];
        // cos = 0.8
        let iv = [vec![1.0, 0.0]];
        let rv = [vec![0.8, 0.6]];
        let base = match_embedded(&inputs, &iv, &refs, &rv, &Thresholds::default());
        assert_eq!(base[0].strength, MatchStrength::Strong);

        let raised = Thresholds {
            strong_match: 0.9,
            ..Thresholds::default()
        };
        let m = match_embedded(&inputs, &iv, &refs, &rv, &raised);
        assert_eq!(m[0].strength, MatchStrength::Partial);
    }
}
