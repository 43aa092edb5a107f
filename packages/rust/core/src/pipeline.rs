//! End-to-end generation pipeline: request → job → plan → research →
//! knowledge → events → sections → sanitize → assemble.
//!
//! [`Generator::start_job`] persists the job and returns its id immediately;
//! the stages run on a background task that is the job's only writer.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use letterpress_markup::{SanitizeOptions, sanitize_sections, sanitize_title};
use letterpress_providers::AdapterRegistry;
use letterpress_shared::{
    AppConfig, FinalDocument, GenerationJob, GenerationRequest, JobId, Result,
};
use letterpress_storage::{JobOutcome, Storage};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::assembler::assemble;
use crate::config_loader::ProviderSet;
use crate::context::JobContext;
use crate::events::load_events;
use crate::knowledge::{HttpKnowledgeSearch, KnowledgeSearch, retrieve_knowledge};
use crate::planner::plan_topic;
use crate::reporter::{ProgressReporter, Stage, StorageReporter};
use crate::research::research_topic;
use crate::sections::{SectionInputs, generate_sections};

/// A job that has been persisted and handed to its background task.
#[derive(Debug)]
pub struct JobHandle {
    pub id: JobId,
    /// Resolves when the job reaches a terminal state. Dropping it does not
    /// stop the job.
    pub task: JoinHandle<()>,
}

/// Creates jobs and runs their pipelines.
#[derive(Clone)]
pub struct Generator {
    storage: Arc<Storage>,
    registry: AdapterRegistry,
    config: Arc<AppConfig>,
    knowledge: Option<Arc<dyn KnowledgeSearch>>,
}

impl Generator {
    pub fn new(storage: Arc<Storage>, registry: AdapterRegistry, config: Arc<AppConfig>) -> Self {
        Self {
            storage,
            registry,
            config,
            knowledge: None,
        }
    }

    /// Build a generator from config, wiring the HTTP knowledge collaborator
    /// when `[knowledge].endpoint` is set.
    pub fn from_config(storage: Arc<Storage>, config: AppConfig) -> Result<Self> {
        let registry = AdapterRegistry::new()?;
        let knowledge = match config.knowledge.endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => {
                Some(Arc::new(HttpKnowledgeSearch::new(endpoint)?) as Arc<dyn KnowledgeSearch>)
            }
            _ => None,
        };
        let generator = Self::new(storage, registry, Arc::new(config));
        Ok(match knowledge {
            Some(search) => generator.with_knowledge_search(search),
            None => generator,
        })
    }

    pub fn with_knowledge_search(mut self, search: Arc<dyn KnowledgeSearch>) -> Self {
        self.knowledge = Some(search);
        self
    }

    pub fn organization_id(&self) -> &str {
        &self.config.defaults.organization_id
    }

    /// Validate the request, persist a `generating` job, and start its
    /// pipeline in the background.
    pub async fn start_job(&self, request: GenerationRequest) -> Result<JobHandle> {
        let options = request.resolve()?;
        let job = GenerationJob::new(self.organization_id(), options);
        self.storage.insert_job(&job).await?;

        let id = job.id;
        info!(job_id = %id, topic = %job.topic, "job created");

        let generator = self.clone();
        let task = tokio::spawn(async move { generator.run_job(job).await });
        Ok(JobHandle { id, task })
    }

    /// Run every stage for `job` and record the terminal state.
    #[instrument(skip_all, fields(job_id = %job.id, topic = %job.topic))]
    pub async fn run_job(&self, job: GenerationJob) {
        let start = Instant::now();
        let reporter = StorageReporter::new(self.storage.clone(), job.id);

        let (outcome, message) = match self.execute(&job, &reporter).await {
            Ok(doc) => {
                let message = format!(
                    "Newsletter ready: {} section(s) in {:.1}s",
                    doc.sections.len(),
                    start.elapsed().as_secs_f64()
                );
                (JobOutcome::Ready(Box::new(doc)), message)
            }
            Err(e) => {
                error!(error = %e, "generation failed");
                (JobOutcome::Failed, format!("Generation failed: {e}"))
            }
        };

        if let Err(e) = self.storage.finish_job(&job.id, outcome, &message).await {
            // The job stays `generating`; there is nowhere else to report this.
            error!(error = %e, "could not record terminal job state");
        }
    }

    async fn execute(
        &self,
        job: &GenerationJob,
        reporter: &dyn ProgressReporter,
    ) -> Result<FinalDocument> {
        // --- Configuration ---
        reporter.log("Loading provider configuration").await;
        let providers = ProviderSet::from_entries(&self.config.providers);
        for skipped in &providers.skipped {
            reporter
                .log(&format!("Skipping provider {}: {}", skipped.name, skipped.reason))
                .await;
        }
        providers.require_generation()?;
        reporter
            .checkpoint(
                Stage::Config,
                &format!(
                    "Using {} generation and {} research provider(s)",
                    providers.generation.len(),
                    providers.research.len()
                ),
            )
            .await;

        let ctx = JobContext {
            job_id: job.id,
            organization_id: job.organization_id.clone(),
            options: job.options.clone(),
            providers,
            brand: self.config.brand.clone(),
            generation: self.config.generation.clone(),
            registry: self.registry.clone(),
        };

        // --- Plan ---
        reporter.log("Planning content").await;
        let outcome = plan_topic(&ctx).await;
        let mut plan = outcome.plan;
        plan.title = sanitize_title(&plan.title);
        let source = outcome
            .provider
            .unwrap_or_else(|| "built-in template".to_string());
        reporter
            .checkpoint(
                Stage::Plan,
                &format!(
                    "Planned \"{}\" with {} section(s) via {source}",
                    plan.title,
                    plan.sections.len()
                ),
            )
            .await;

        // --- Research ---
        let research = if ctx.options.skip_research {
            reporter.checkpoint(Stage::Research, "Research skipped").await;
            String::new()
        } else {
            reporter.log("Researching topic").await;
            let text = research_topic(&ctx).await;
            let message = if text.is_empty() {
                "Research unavailable, continuing without it".to_string()
            } else {
                format!("Research gathered ({} characters)", text.chars().count())
            };
            reporter.checkpoint(Stage::Research, &message).await;
            text
        };

        // --- Knowledge ---
        let knowledge = if ctx.options.include_knowledge {
            let snippets = retrieve_knowledge(
                self.knowledge.as_deref(),
                &self.storage,
                ctx.topic(),
                &ctx.organization_id,
                ctx.generation.knowledge_limit,
            )
            .await;
            reporter
                .checkpoint(
                    Stage::Knowledge,
                    &format!("Found {} knowledge snippet(s)", snippets.len()),
                )
                .await;
            snippets
        } else {
            Vec::new()
        };

        // --- Events ---
        let events = if ctx.options.include_events {
            let events =
                load_events(&self.storage, &ctx.organization_id, ctx.generation.max_events).await;
            reporter
                .checkpoint(
                    Stage::Events,
                    &format!("Found {} upcoming event(s)", events.len()),
                )
                .await;
            events
        } else {
            Vec::new()
        };

        // --- Sections ---
        let inputs = SectionInputs {
            plan: &plan,
            research: &research,
            knowledge: &knowledge,
            events: &events,
        };
        let sections = generate_sections(&ctx, inputs, reporter).await;
        let fallbacks = sections.iter().filter(|s| s.metadata.fallback_used).count();
        reporter
            .checkpoint(
                Stage::Sections,
                &format!(
                    "Wrote {} section(s), {fallbacks} from placeholder",
                    sections.len()
                ),
            )
            .await;

        // --- Sanitize ---
        let written = sections.len();
        let kept = sanitize_sections(sections, &SanitizeOptions::from(&ctx.generation));
        reporter
            .checkpoint(
                Stage::Sanitize,
                &format!("Kept {} of {written} section(s) after cleanup", kept.len()),
            )
            .await;

        // --- Assemble ---
        Ok(assemble(&plan, kept, &ctx.brand, Utc::now().date_naive()))
    }
}
