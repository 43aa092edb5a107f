//! Google Gemini `generateContent`.

use async_trait::async_trait;
use letterpress_shared::Provider;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::{ProviderError, classify_status};
use crate::{CompletionRequest, ModelAdapter, base_url};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_MAX_TOKENS: u32 = 2_000;

pub struct GeminiAdapter {
    client: Client,
}

impl GeminiAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn endpoint(provider: &Provider) -> Result<Url, ProviderError> {
        let model = provider.setting_str("model").unwrap_or(DEFAULT_MODEL);
        let raw = format!(
            "{}/models/{model}:generateContent",
            base_url(provider, DEFAULT_BASE_URL)
        );
        Url::parse_with_params(&raw, &[("key", provider.credential.trim())])
            .map_err(|e| ProviderError::InvalidResponse(format!("bad endpoint {raw}: {e}")))
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl ModelAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        provider: &Provider,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let url = Self::endpoint(provider)?;

        let mut generation_config = json!({
            "maxOutputTokens": request.max_tokens_for(provider, DEFAULT_MAX_TOKENS),
        });
        if let Some(temperature) = request.temperature_for(provider) {
            generation_config["temperature"] = json!(temperature);
        }
        if request.json {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": generation_config,
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let response = self.client.post(url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("no candidate text".into()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::provider;
    use letterpress_shared::ProviderKind;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn generate_reads_candidate_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "<p>Gemini says hi</p>" }] } }]
            })))
            .mount(&server)
            .await;

        let p = provider(ProviderKind::Gemini, &server.uri());
        let text = GeminiAdapter::new(Client::new())
            .generate(&p, &CompletionRequest::new("x"))
            .await
            .expect("completion");
        assert_eq!(text, "<p>Gemini says hi</p>");
    }

    #[tokio::test]
    async fn server_error_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let p = provider(ProviderKind::Gemini, &server.uri());
        let err = GeminiAdapter::new(Client::new())
            .generate(&p, &CompletionRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::Http {
                status: 503,
                message: "overloaded".into()
            }
        );
    }
}
