//! Review history: saved reviews, reviewer feedback, and portfolio statistics.

mod error;
pub mod record;
pub mod stats;

pub use error::StoreError;
pub use record::{FlagAction, NewReview, ReviewAction, ReviewListing, ReviewRecord};
pub use stats::{PortfolioStats, RuleEffectiveness, portfolio_stats, rule_effectiveness};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::ReviewStore;
