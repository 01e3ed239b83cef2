//! Review engine: embeddings, clause and rule matching, heuristic
//! classification, and optional LLM escalation.

#[cfg(feature = "llm")]
mod anthropic;
#[cfg(feature = "onnx")]
mod embedder;
pub mod escalate;
pub mod hashing;
pub mod heuristic;
pub mod matcher;
pub mod provider;
pub mod review;
pub mod rules;
pub mod similarity;

#[cfg(feature = "llm")]
pub use anthropic::{AnthropicEscalator, DEFAULT_MODEL as DEFAULT_LLM_MODEL};
#[cfg(feature = "onnx")]
pub use embedder::OnnxEmbedder;
pub use escalate::{AnalysisMode, EscalationError, Escalator};
pub use hashing::HashingEmbedder;
pub use heuristic::classify;
pub use matcher::{ClauseMatch, match_clauses};
pub use provider::{EmbedError, EmbeddingProvider, LazyProvider, ProviderFactory};
pub use review::{Review, ReviewError, ReviewStats, Reviewer};
pub use rules::{RuleIndex, RuleMatch, adjust_specificity};
