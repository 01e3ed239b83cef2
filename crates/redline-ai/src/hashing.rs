//! Dependency-free bag-of-words embedder.
//!
//! Terms are hashed into fixed buckets (FNV-1a) and weighted by term
//! frequency, then L2-normalised. Used when no ONNX model is installed and
//! as a deterministic provider in tests.

use std::collections::BTreeMap;

use crate::provider::{EmbedError, EmbeddingProvider};
use crate::similarity::normalize;

pub const DEFAULT_DIMENSIONS: usize = 384;

pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn bucket(&self, term: &str) -> usize {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in term.as_bytes() {
            h ^= u64::from(*b);
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
        (h % self.dimensions as u64) as usize
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        // Ordered so bucket sums accumulate identically on every call.
        let mut counts: BTreeMap<String, f32> = BTreeMap::new();
        let mut total = 0.0f32;
        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= 2)
        {
            *counts.entry(term.to_lowercase()).or_default() += 1.0;
            total += 1.0;
        }

        let mut v = vec![0.0f32; self.dimensions];
        for (term, count) in &counts {
            // Longer terms carry more signal than short function words.
            let weight = 1.0 + (term.len() as f32).ln();
            v[self.bucket(term)] += (count / total) * weight;
        }
        normalize(&mut v);
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing-bow"
    }

    fn encode(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}
