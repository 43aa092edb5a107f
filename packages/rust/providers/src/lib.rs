//! Typed model adapters for the providers Letterpress talks to.
//!
//! Each [`ProviderKind`] maps to one [`ModelAdapter`] implementation through
//! the [`AdapterRegistry`]. Adding a provider family means registering an
//! adapter, not editing dispatch logic.

mod anthropic;
mod error;
mod gemini;
mod openai;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use letterpress_shared::{LetterpressError, Provider, ProviderKind, Result};
use reqwest::Client;

pub use anthropic::AnthropicAdapter;
pub use error::ProviderError;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiCompatibleAdapter;

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("Letterpress/", env!("CARGO_PKG_VERSION"));

/// Upper bound on a single model call. Generation of long sections is slow.
const REQUEST_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Request type
// ---------------------------------------------------------------------------

/// Prompt text plus sampling settings for one completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Overrides the provider's `temperature` setting.
    pub temperature: Option<f64>,
    /// Overrides the provider's `max_tokens` setting.
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON object when it supports a JSON mode.
    pub json: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Effective temperature: request override, then provider setting.
    pub(crate) fn temperature_for(&self, provider: &Provider) -> Option<f64> {
        self.temperature.or_else(|| provider.setting_f64("temperature"))
    }

    /// Effective token cap: request override, provider setting, then `default`.
    pub(crate) fn max_tokens_for(&self, provider: &Provider, default: u32) -> u32 {
        self.max_tokens
            .or_else(|| provider.setting_u64("max_tokens").map(|v| v as u32))
            .unwrap_or(default)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A uniform "prompt in, text out" capability over one provider API family.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Human-readable adapter name for tracing.
    fn name(&self) -> &str;

    /// Run one completion against `provider` and return the generated text.
    async fn generate(
        &self,
        provider: &Provider,
        request: &CompletionRequest,
    ) -> std::result::Result<String, ProviderError>;

    /// Whether [`ModelAdapter::generate_image`] is implemented for `kind`.
    fn supports_images(&self, _kind: ProviderKind) -> bool {
        false
    }

    /// Generate an image and return its URL.
    async fn generate_image(
        &self,
        _provider: &Provider,
        _prompt: &str,
    ) -> std::result::Result<String, ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "{} cannot generate images",
            self.name()
        )))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps each provider kind to its adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn ModelAdapter>>,
}

impl AdapterRegistry {
    /// Create a registry with all built-in adapters.
    pub fn new() -> Result<Self> {
        let client = build_client()?;
        let openai: Arc<dyn ModelAdapter> = Arc::new(OpenAiCompatibleAdapter::new(client.clone()));

        Ok(Self::empty()
            .with_adapter(ProviderKind::OpenAi, openai.clone())
            .with_adapter(ProviderKind::OpenRouter, openai.clone())
            .with_adapter(ProviderKind::Perplexity, openai)
            .with_adapter(
                ProviderKind::Anthropic,
                Arc::new(AnthropicAdapter::new(client.clone())),
            )
            .with_adapter(ProviderKind::Gemini, Arc::new(GeminiAdapter::new(client))))
    }

    /// A registry with no adapters registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register (or replace) the adapter for `kind`.
    pub fn with_adapter(mut self, kind: ProviderKind, adapter: Arc<dyn ModelAdapter>) -> Self {
        self.adapters.insert(kind, adapter);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn ModelAdapter>> {
        self.adapters.get(&kind)
    }

    pub fn supports_images(&self, kind: ProviderKind) -> bool {
        self.get(kind).is_some_and(|a| a.supports_images(kind))
    }

    /// Dispatch a completion to the adapter registered for the provider's kind.
    pub async fn generate(
        &self,
        provider: &Provider,
        request: &CompletionRequest,
    ) -> std::result::Result<String, ProviderError> {
        let adapter = self.adapter_for(provider)?;
        tracing::debug!(adapter = adapter.name(), provider = %provider.name, "dispatching completion");
        adapter.generate(provider, request).await
    }

    /// Dispatch an image generation to the adapter registered for the provider's kind.
    pub async fn generate_image(
        &self,
        provider: &Provider,
        prompt: &str,
    ) -> std::result::Result<String, ProviderError> {
        self.adapter_for(provider)?
            .generate_image(provider, prompt)
            .await
    }

    fn adapter_for(
        &self,
        provider: &Provider,
    ) -> std::result::Result<&Arc<dyn ModelAdapter>, ProviderError> {
        self.get(provider.kind).ok_or_else(|| {
            ProviderError::Unsupported(format!("no adapter registered for {}", provider.kind))
        })
    }
}

/// Build a reqwest client with appropriate settings.
fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| LetterpressError::Network(format!("failed to build HTTP client: {e}")))
}

/// Resolve the API base URL: `base_url` setting first, then the kind's default.
pub(crate) fn base_url(provider: &Provider, default: &str) -> String {
    provider
        .setting_str("base_url")
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    use letterpress_shared::{Provider, ProviderCategory, ProviderKind};

    /// A provider pointed at a mock server.
    pub fn provider(kind: ProviderKind, base_url: &str) -> Provider {
        let mut settings = serde_json::Map::new();
        settings.insert("base_url".into(), serde_json::Value::String(base_url.into()));
        Provider {
            id: format!("{kind}-test"),
            name: format!("{kind} test"),
            kind,
            category: ProviderCategory::Generation,
            credential: "test-key".into(),
            settings,
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterpress_shared::ProviderCategory;

    struct EchoAdapter;

    #[async_trait]
    impl ModelAdapter for EchoAdapter {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            provider: &Provider,
            request: &CompletionRequest,
        ) -> std::result::Result<String, ProviderError> {
            Ok(format!("{}:{}", provider.id, request.prompt))
        }
    }

    fn provider(kind: ProviderKind) -> Provider {
        Provider {
            id: "p1".into(),
            name: "Test".into(),
            kind,
            category: ProviderCategory::Generation,
            credential: "key".into(),
            settings: serde_json::Map::new(),
            active: true,
        }
    }

    #[tokio::test]
    async fn registry_dispatches_by_kind() {
        let registry = AdapterRegistry::empty().with_adapter(ProviderKind::Gemini, Arc::new(EchoAdapter));
        let out = registry
            .generate(&provider(ProviderKind::Gemini), &CompletionRequest::new("hi"))
            .await
            .expect("echo");
        assert_eq!(out, "p1:hi");
    }

    #[tokio::test]
    async fn registry_missing_kind_is_unsupported() {
        let registry = AdapterRegistry::empty();
        let err = registry
            .generate(&provider(ProviderKind::Anthropic), &CompletionRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[tokio::test]
    async fn default_image_generation_is_unsupported() {
        let registry = AdapterRegistry::empty().with_adapter(ProviderKind::Gemini, Arc::new(EchoAdapter));
        assert!(!registry.supports_images(ProviderKind::Gemini));
        let err = registry
            .generate_image(&provider(ProviderKind::Gemini), "a lighthouse")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[test]
    fn builtin_registry_covers_every_kind() {
        let registry = AdapterRegistry::new().expect("registry");
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::OpenRouter,
            ProviderKind::Perplexity,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
        ] {
            assert!(registry.get(kind).is_some(), "missing adapter for {kind}");
        }
        assert!(registry.supports_images(ProviderKind::OpenAi));
        assert!(!registry.supports_images(ProviderKind::Anthropic));
    }

    #[test]
    fn request_settings_precedence() {
        let mut p = provider(ProviderKind::OpenAi);
        p.settings.insert("temperature".into(), serde_json::json!(0.2));
        p.settings.insert("max_tokens".into(), serde_json::json!(900));

        let request = CompletionRequest::new("x");
        assert_eq!(request.temperature_for(&p), Some(0.2));
        assert_eq!(request.max_tokens_for(&p, 100), 900);

        let request = CompletionRequest {
            temperature: Some(0.9),
            ..CompletionRequest::new("x")
        }
        .with_max_tokens(50);
        assert_eq!(request.temperature_for(&p), Some(0.9));
        assert_eq!(request.max_tokens_for(&p, 100), 50);
    }
}
