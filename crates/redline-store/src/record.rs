//! Persisted review and reviewer-feedback records.

use std::fmt;
use std::str::FromStr;

use redline_core::{Classification, Flag, ReviewSummary, Severity};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A human reviewer's decision on a flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Modified,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Modified => "modified",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewAction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" | "accept" => Ok(Self::Accepted),
            "rejected" | "reject" => Ok(Self::Rejected),
            "modified" | "modify" => Ok(Self::Modified),
            _ => Err(StoreError::InvalidAction(s.to_string())),
        }
    }
}

/// A review about to be saved.
#[derive(Debug, Clone)]
pub struct NewReview<'a> {
    pub contract_name: &'a str,
    pub reviewer: &'a str,
    pub analysis_mode: &'a str,
    pub summary: &'a ReviewSummary,
    /// Free-form run metadata (sources, model names, counts).
    pub metadata: serde_json::Value,
    pub flags: &'a [Flag],
}

/// One row of the review history listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewListing {
    pub id: i64,
    pub contract_name: String,
    /// RFC 3339 timestamp.
    pub date: String,
    pub reviewer: String,
    pub status: String,
    pub analysis_mode: String,
}

/// A saved review with its full result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(flatten)]
    pub listing: ReviewListing,
    pub summary: ReviewSummary,
    pub metadata: serde_json::Value,
    pub flags: Vec<Flag>,
}

/// Reviewer feedback state of one flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagAction {
    pub review_id: i64,
    pub flag_id: String,
    pub classification: Classification,
    pub risk_level: Severity,
    pub confidence: f32,
    pub action: ReviewAction,
    pub note: String,
    pub reviewer_name: String,
    /// RFC 3339 timestamp of the last action, if any.
    pub action_timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parsing() {
        assert_eq!("Accepted".parse::<ReviewAction>().unwrap(), ReviewAction::Accepted);
        assert_eq!("reject".parse::<ReviewAction>().unwrap(), ReviewAction::Rejected);
        assert!(matches!(
            "ignore".parse::<ReviewAction>(),
            Err(StoreError::InvalidAction(_))
        ));
        assert_eq!(ReviewAction::default().to_string(), "pending");
    }
}
