//! Anthropic Messages API.

use async_trait::async_trait;
use letterpress_shared::Provider;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, classify_status};
use crate::{CompletionRequest, ModelAdapter, base_url};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2_000;

pub struct AnthropicAdapter {
    client: Client,
}

impl AnthropicAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        provider: &Provider,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", base_url(provider, DEFAULT_BASE_URL));
        debug!(%url, "messages request");

        let mut body = json!({
            "model": provider.setting_str("model").unwrap_or(DEFAULT_MODEL),
            "max_tokens": request.max_tokens_for(provider, DEFAULT_MAX_TOKENS),
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature_for(provider) {
            body["temperature"] = json!(temperature);
        }

        let response = self
            .client
            .post(&url)
            .header("x-api-key", provider.credential.trim())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: MessagesResponse = response.json().await?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("no text blocks in response".into()));
        }
        Ok(text)
    }
}
