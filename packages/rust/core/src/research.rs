//! Optional research stage. Total failure is non-fatal and yields no text.

use letterpress_providers::CompletionRequest;
use tracing::{info, instrument, warn};

use crate::context::JobContext;
use crate::executor::try_providers;

const RESEARCH_MAX_TOKENS: u32 = 1_500;

/// Ask research providers for recent, factual material on the topic.
///
/// Returns an empty string when no research provider is configured or all of
/// them fail.
#[instrument(skip_all, fields(topic = %ctx.topic()))]
pub async fn research_topic(ctx: &JobContext) -> String {
    let prompt = format!(
        "RESEARCH BRIEF\n\
         Topic: {topic}\n\n\
         Gather recent, factual, newsletter-relevant information about this topic: \
         notable developments from the last few months, concrete statistics, named \
         organizations, and upcoming milestones. Prefer verifiable facts over opinion. \
         Answer in plain prose, at most 400 words.",
        topic = ctx.topic()
    );
    let request = CompletionRequest::new(prompt).with_max_tokens(RESEARCH_MAX_TOKENS);
    let registry = &ctx.registry;
    let request = &request;

    match try_providers(&ctx.providers.research, "research", |provider| async move {
        registry.generate(provider, request).await
    })
    .await
    {
        Ok(success) => {
            info!(provider = %success.provider.name, chars = success.value.len(), "research gathered");
            success.value.trim().to_string()
        }
        Err(e) => {
            warn!(error = %e, "research unavailable, continuing without it");
            String::new()
        }
    }
}

/// The first `max_chars` characters of the research text, cut at a word boundary.
pub fn research_excerpt(research: &str, max_chars: usize) -> String {
    if research.chars().count() <= max_chars {
        return research.to_string();
    }
    let cut: String = research.chars().take(max_chars).collect();
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => format!("{}…", cut[..idx].trim_end()),
        _ => format!("{cut}…"),
    }
}
