//! Anthropic Messages API escalator.

use async_trait::async_trait;
use redline_core::Assessment;
use serde::Deserialize;
use tracing::debug;

use crate::escalate::{EscalationError, Escalator, build_prompt, parse_assessment};
use crate::matcher::ClauseMatch;
use crate::rules::RuleMatch;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicEscalator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicEscalator {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            url: API_URL.to_string(),
        }
    }

    /// Point at a different Messages endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.url = format!("{}/v1/messages", base_url.trim_end_matches('/'));
        self
    }

    async fn complete(&self, prompt: String) -> Result<String, EscalationError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EscalationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = resp.json().await?;
        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| EscalationError::Malformed("no text content in response".into()))
    }
}

#[async_trait]
impl Escalator for AnthropicEscalator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn escalate(
        &self,
        clause_match: &ClauseMatch<'_>,
        rules: &[RuleMatch<'_>],
    ) -> Result<Assessment, EscalationError> {
        let prompt = build_prompt(clause_match, rules);
        debug!(clause = %clause_match.input.id, model = %self.model, "escalating clause");
        let reply = self.complete(prompt).await?;
        parse_assessment(&reply)
    }
}
