//! Per-job state threaded through every stage.

use letterpress_providers::AdapterRegistry;
use letterpress_shared::{BrandConfig, GenerationConfig, GenerationOptions, JobId};

use crate::config_loader::ProviderSet;

/// Everything a stage needs to know about the job it is working on.
///
/// Built once by the configuration stage; stages borrow it and pass their
/// outputs to the next stage explicitly.
#[derive(Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub organization_id: String,
    pub options: GenerationOptions,
    pub providers: ProviderSet,
    pub brand: BrandConfig,
    pub generation: GenerationConfig,
    pub registry: AdapterRegistry,
}

impl JobContext {
    pub fn topic(&self) -> &str {
        &self.options.topic
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use letterpress_providers::{CompletionRequest, ModelAdapter, ProviderError};
    use letterpress_shared::{
        GenerationMode, GenerationRequest, Provider, ProviderCategory, ProviderKind,
    };

    use super::*;

    /// Canned answers keyed by what the prompt asks for.
    pub struct FakeAdapter {
        pub plan_json: String,
        pub section_html: String,
        pub research: String,
        /// Provider ids whose calls fail.
        pub failing: Vec<String>,
        /// Every provider id invoked, in order.
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeAdapter {
        pub fn healthy() -> Self {
            Self {
                plan_json: r#"{"title":"Five Ways AI Is Quietly Rewiring Patient Care",
                    "subtitle":"What clinics are learning",
                    "sections":[
                      {"type":"hero","title":"Triage gets a second opinion","description":"Open with triage models"},
                      {"type":"article","title":"Paperwork, automated","description":"Documentation assistants"},
                      {"type":"summary","title":"What to watch next","description":"Close with outlook"}
                    ]}"#
                .into(),
                section_html: "<p>Hello everyone! Hospitals piloting early-warning models report \
                    that nurses receive deterioration alerts hours before manual charting would \
                    have caught them.</p><ul><li>Fewer ICU transfers</li><li>Shorter stays</li></ul>"
                    .into(),
                research: "Recent studies show triage models reduce wait times.".into(),
                failing: Vec::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn failing_all() -> Self {
            Self {
                failing: vec!["*".into()],
                ..Self::healthy()
            }
        }

        pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
            self.calls.clone()
        }
    }

    #[async_trait]
    impl ModelAdapter for FakeAdapter {
        fn name(&self) -> &str {
            "fake"
        }

        async fn generate(
            &self,
            provider: &Provider,
            request: &CompletionRequest,
        ) -> Result<String, ProviderError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(provider.id.clone());
            }
            if self.failing.iter().any(|id| id == "*" || *id == provider.id) {
                return Err(ProviderError::Http {
                    status: 500,
                    message: "upstream exploded".into(),
                });
            }
            if request.json {
                Ok(self.plan_json.clone())
            } else if request.prompt.contains("RESEARCH BRIEF") {
                Ok(self.research.clone())
            } else {
                Ok(self.section_html.clone())
            }
        }
    }

    pub fn provider(id: &str, category: ProviderCategory) -> Provider {
        Provider {
            id: id.into(),
            name: format!("OpenAI {id}"),
            kind: ProviderKind::OpenAi,
            category,
            credential: "sk-test".into(),
            settings: serde_json::Map::new(),
            active: true,
        }
    }

    pub fn context(adapter: FakeAdapter, num_sections: usize) -> JobContext {
        let options = GenerationRequest {
            num_sections: Some(num_sections),
            skip_research: true,
            ..GenerationRequest::new("AI in Healthcare", GenerationMode::Custom)
        }
        .resolve()
        .expect("resolve");

        JobContext {
            job_id: JobId::new(),
            organization_id: "acme".into(),
            options,
            providers: ProviderSet {
                research: vec![provider("research-1", ProviderCategory::Research)],
                generation: vec![provider("gen-1", ProviderCategory::Generation)],
                skipped: Vec::new(),
            },
            brand: BrandConfig::default(),
            generation: GenerationConfig::default(),
            registry: AdapterRegistry::empty().with_adapter(ProviderKind::OpenAi, Arc::new(adapter)),
        }
    }
}
