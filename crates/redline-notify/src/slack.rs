//! Slack Block Kit payload for a completed review.

use redline_core::{ReviewSummary, Severity};
use serde_json::{Value, json};

/// What a review-complete message reports.
#[derive(Debug, Clone)]
pub struct ReviewNotice<'a> {
    pub contract_name: &'a str,
    pub review_id: i64,
    pub summary: &'a ReviewSummary,
    /// Base URL of the review dashboard; the review id is appended as a query.
    pub dashboard_url: &'a str,
}

impl ReviewNotice<'_> {
    pub fn dashboard_link(&self) -> String {
        format!("{}?review_id={}", self.dashboard_url, self.review_id)
    }
}

/// Webhook body: header, a field grid, and a dashboard button.
pub fn review_blocks(notice: &ReviewNotice<'_>) -> Value {
    let field = |label: &str, value: String| {
        json!({ "type": "mrkdwn", "text": format!("*{label}:*\n{value}") })
    };

    json!({
        "blocks": [
            {
                "type": "header",
                "text": { "type": "plain_text", "text": "DPA Review Complete" }
            },
            {
                "type": "section",
                "fields": [
                    field("Contract", notice.contract_name.to_string()),
                    field("Review ID", format!("#{}", notice.review_id)),
                    field("Total Clauses", notice.summary.total_clauses_analyzed.to_string()),
                    field("High Risk", notice.summary.risk_count(Severity::High).to_string()),
                ]
            },
            {
                "type": "actions",
                "elements": [{
                    "type": "button",
                    "text": { "type": "plain_text", "text": "Open Review Dashboard" },
                    "url": notice.dashboard_link(),
                    "style": "primary"
                }]
            }
        ]
    })
}
