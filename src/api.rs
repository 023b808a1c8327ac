//! Typed client for the Vaelis backend's request/response endpoints.
//!
//! Streaming lives in [`crate::stream`]; everything here is a plain JSON
//! round trip: the single-shot generation fallback and the conversation
//! lookups used by the CLI and resume flow.

use crate::config::Config;
use crate::stream::GenerationRequest;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::Duration;
use tracing::debug;

/// Result of a non-streaming generation
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub output: String,
    pub conv_id: Option<i64>,
    /// Full response payload, kept for callers that want more than the text
    pub raw: serde_json::Value,
}

/// Conversation summary as returned by `GET /conversations`
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub title: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub tags: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A persisted message within a conversation
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Full conversation as returned by `GET /conversations/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationDetail {
    pub conversation: ConversationSummary,
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Deserialize)]
struct ConversationListResponse {
    conversations: Vec<ConversationSummary>,
}

/// Client for the backend's JSON endpoints
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token(),
        }
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            anyhow!("no API token configured. Set VAELIS_API_TOKEN or add api_token to config.toml")
        })
    }

    /// Single-shot generation, used as the fallback when streaming fails.
    ///
    /// Sends the same (prompt, mode, use_search, conv_id) tuple as the
    /// streaming call and is independent of any prior stream session.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let url = format!("{}/ai/generate", self.base_url);
        let payload = serde_json::json!({
            "prompt": request.prompt,
            "mode": request.mode.wire_name(),
            "use_search": request.use_search,
            "conv_id": request.conv_id,
        });

        debug!(mode = request.mode.wire_name(), "single-shot generation");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token()?)
            .json(&payload)
            .send()
            .await
            .context("generation request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("generation failed ({}): {}", status, body.trim()));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .context("generation response was not JSON")?;

        // Mirror the web client: prefer `output`, fall back to the raw payload
        let output = raw
            .get("output")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| raw.to_string());
        let conv_id = raw.get("conv_id").and_then(|v| v.as_i64());

        Ok(GenerationResult {
            output,
            conv_id,
            raw,
        })
    }

    /// List the caller's conversations
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let url = format!("{}/conversations", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await
            .context("conversation list request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "conversation list failed ({})",
                response.status()
            ));
        }

        let list: ConversationListResponse = response
            .json()
            .await
            .context("conversation list response was not JSON")?;
        Ok(list.conversations)
    }

    /// Fetch one conversation with its messages
    pub async fn get_conversation(&self, id: i64) -> Result<ConversationDetail> {
        let url = format!("{}/conversations/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await
            .context("conversation fetch failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "conversation {} fetch failed ({})",
                id,
                response.status()
            ));
        }

        let detail: ConversationDetail = response
            .json()
            .await
            .context("conversation response was not JSON")?;
        Ok(detail)
    }
}
