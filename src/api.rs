use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Base URL of the completion backend when neither the config file nor
/// `PAGUME_API_URL` names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Serialize)]
struct ChatRequest {
    prompt: String,
}

#[derive(Deserialize)]
struct ChatReply {
    reply: String,
}

#[derive(Deserialize)]
struct ChatErrorBody {
    error: String,
}

/// Client for the Pagume completion backend.
///
/// One operation: a fully formed prompt in, the reply text out. Every
/// failure shape (transport error, non-2xx status, provider error body)
/// collapses to a single error kind for the caller.
#[derive(Clone)]
pub struct ChatApi {
    client: Client,
    base_url: String,
}

impl ChatApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(chars = prompt.chars().count(), "sending completion request");

        let request = ChatRequest {
            prompt: prompt.to_string(),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        // Status is checked before the body is parsed. On failure, prefer
        // the provider's own error text over the bare status line.
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ChatErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(anyhow!("chat request failed ({}): {}", status, detail));
        }

        let body: ChatReply = response.json().await?;
        debug!(chars = body.reply.chars().count(), "completion reply received");
        Ok(body.reply)
    }
}
