//! OpenAI-compatible chat completions (OpenAI, OpenRouter, Perplexity).

use async_trait::async_trait;
use letterpress_shared::{Provider, ProviderKind};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ProviderError, classify_status};
use crate::{CompletionRequest, ModelAdapter, base_url};

const DEFAULT_MAX_TOKENS: u32 = 2_000;
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_IMAGE_SIZE: &str = "1792x1024";

/// One adapter for every API that speaks the `/chat/completions` envelope.
pub struct OpenAiCompatibleAdapter {
    client: Client,
}

impl OpenAiCompatibleAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn default_base_url(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::Perplexity => "https://api.perplexity.ai",
            _ => "https://api.openai.com/v1",
        }
    }

    fn default_model(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::OpenRouter => "openai/gpt-4o-mini",
            ProviderKind::Perplexity => "sonar",
            _ => "gpt-4o-mini",
        }
    }

    fn build_body(provider: &Provider, request: &CompletionRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let model = provider
            .setting_str("model")
            .unwrap_or(Self::default_model(provider.kind));

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens_for(provider, DEFAULT_MAX_TOKENS),
        });
        if let Some(temperature) = request.temperature_for(provider) {
            body["temperature"] = json!(temperature);
        }
        // Only OpenAI proper honours response_format reliably.
        if request.json && provider.kind == ProviderKind::OpenAi {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl ModelAdapter for OpenAiCompatibleAdapter {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(
        &self,
        provider: &Provider,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/chat/completions",
            base_url(provider, Self::default_base_url(provider.kind))
        );
        debug!(%url, kind = %provider.kind, "chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(provider.credential.trim())
            .json(&Self::build_body(provider, request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("empty completion".into()))
    }

    fn supports_images(&self, kind: ProviderKind) -> bool {
        kind == ProviderKind::OpenAi
    }

    async fn generate_image(&self, provider: &Provider, prompt: &str) -> Result<String, ProviderError> {
        if !self.supports_images(provider.kind) {
            return Err(ProviderError::Unsupported(format!(
                "{} has no image endpoint",
                provider.kind
            )));
        }

        let url = format!(
            "{}/images/generations",
            base_url(provider, Self::default_base_url(provider.kind))
        );
        let body = json!({
            "model": provider.setting_str("image_model").unwrap_or(DEFAULT_IMAGE_MODEL),
            "prompt": prompt,
            "n": 1,
            "size": DEFAULT_IMAGE_SIZE,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(provider.credential.trim())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: ImageResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| ProviderError::InvalidResponse("image response had no url".into()))
    }
}
