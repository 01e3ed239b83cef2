//! Core review types, clause segmentation, rulebook loading, and thresholds.

pub mod config;
pub mod error;
pub mod model;
pub mod rulebook;
pub mod segment;
pub mod summary;

pub use config::Thresholds;
pub use error::CoreError;
pub use model::{
    AnalysisOrigin, Assessment, Classification, Clause, ClauseSource, Flag, MatchStrength,
    Paragraph, Rule, RuleSource, Severity, TriggeredRule,
};
pub use rulebook::{Sheet, Workbook, load_rulebook, load_rulebook_file};
pub use segment::segment;
pub use summary::{ReviewSummary, TopRisk, summarize};
