//! Slack incoming-webhook client.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::slack::{ReviewNotice, review_blocks};

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned {status}: {body}")]
    Webhook { status: u16, body: String },
}

pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    /// `None` or an empty URL disables delivery.
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Post a review-complete message. Returns `Ok(false)` without making a
    /// request when no webhook is configured.
    pub async fn notify_review(&self, notice: &ReviewNotice<'_>) -> Result<bool, NotifyError> {
        let Some(url) = &self.webhook_url else {
            return Ok(false);
        };

        let resp = self
            .client
            .post(url)
            .timeout(TIMEOUT)
            .json(&review_blocks(notice))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Webhook {
                status: status.as_u16(),
                body,
            });
        }

        info!(review_id = notice.review_id, "sent Slack notification");
        Ok(true)
    }
}
