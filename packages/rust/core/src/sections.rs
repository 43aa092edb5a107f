//! Section generator: one position-aware prompt and one fallback chain per
//! planned section.
//!
//! Sections are written strictly in plan order so every prompt can name the
//! sections that were actually produced before it.

use chrono::Utc;
use letterpress_markup::escape_html;
use letterpress_providers::CompletionRequest;
use letterpress_shared::{
    ContentPlan, Event, KnowledgeSnippet, Section, SectionMetadata, SectionPlan,
};
use tracing::{info, instrument, warn};

use crate::context::JobContext;
use crate::events::{EVENTS_PER_SECTION, relevant_events};
use crate::executor::try_providers;
use crate::images::attach_image;
use crate::presets::tone_summary;
use crate::reporter::{ProgressReporter, Stage};
use crate::research::research_excerpt;

/// Knowledge snippets quoted in any one section prompt.
const SNIPPETS_PER_SECTION: usize = 2;

const SECTION_SYSTEM: &str = "You are a professional newsletter writer. Respond with the \
     section body only, as lightweight HTML. Never greet the reader or introduce yourself.";

/// Upstream material shared by every section of one job.
#[derive(Debug, Clone, Copy)]
pub struct SectionInputs<'a> {
    pub plan: &'a ContentPlan,
    pub research: &'a str,
    pub knowledge: &'a [KnowledgeSnippet],
    pub events: &'a [Event],
}

/// Where a section sits in the narrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Opening,
    Middle,
    Closing,
}

impl Position {
    fn of(index: usize, total: usize) -> Self {
        if index == 0 {
            Self::Opening
        } else if index + 1 == total {
            Self::Closing
        } else {
            Self::Middle
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            Self::Opening => {
                "This is the OPENING section. Hook the reader with the most striking fact or \
                 development, then state plainly what the newsletter will cover."
            }
            Self::Middle => {
                "This is a MIDDLE section. Pick up where the previous section left off and \
                 advance the narrative with new information. Do not repeat earlier points."
            }
            Self::Closing => {
                "This is the CLOSING section. Synthesize the earlier sections into clear \
                 takeaways and end with a forward-looking conclusion."
            }
        }
    }
}

/// Generate one section per plan stub, in order.
///
/// Never fails: a section whose fallback chain is exhausted gets a placeholder
/// body built from its stub and is marked `fallback_used`.
#[instrument(skip_all, fields(topic = %ctx.topic(), sections = inputs.plan.sections.len()))]
pub async fn generate_sections(
    ctx: &JobContext,
    inputs: SectionInputs<'_>,
    reporter: &dyn ProgressReporter,
) -> Vec<Section> {
    let total = inputs.plan.sections.len();
    let start = Stage::Events.percent();
    let span = Stage::Sections.percent() - start;
    let mut sections: Vec<Section> = Vec::with_capacity(total);

    for (index, stub) in inputs.plan.sections.iter().enumerate() {
        let percent = start + (span as usize * index / total.max(1)) as u8;
        reporter
            .progress(
                percent,
                &format!("Writing section {} of {total}: {}", index + 1, stub.title),
            )
            .await;

        let written: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        let prompt = build_section_prompt(ctx, &inputs, stub, index, total, &written);
        let section = write_section(ctx, stub, index, prompt).await;

        if section.metadata.fallback_used {
            reporter
                .log(&format!(
                    "All providers failed for section {}, using placeholder",
                    index + 1
                ))
                .await;
        }
        sections.push(section);
    }

    sections
}

async fn write_section(ctx: &JobContext, stub: &SectionPlan, index: usize, prompt: String) -> Section {
    let (_, max_words) = ctx.options.section_length.word_range();
    let request = CompletionRequest::new(prompt)
        .with_system(SECTION_SYSTEM)
        .with_max_tokens(max_words * 2 + 200);
    let registry = &ctx.registry;
    let request = &request;
    let label = format!("section {}", index + 1);

    let (content, provider, fallback_used) =
        match try_providers(&ctx.providers.generation, &label, |provider| async move {
            registry.generate(provider, request).await
        })
        .await
        {
            Ok(success) => {
                info!(section = index + 1, provider = %success.provider.name, "section written");
                (success.value, Some(success.provider.name.clone()), false)
            }
            Err(e) => {
                warn!(section = index + 1, error = %e, "section generation exhausted, using placeholder");
                (placeholder_body(&ctx.options.topic, stub), None, true)
            }
        };

    Section {
        id: format!("section-{}", index + 1),
        section_type: stub.section_type,
        title: stub.title.clone(),
        content,
        image: attach_image(ctx, &stub.title, index).await,
        metadata: SectionMetadata {
            generated_at: Utc::now(),
            fallback_used,
            provider,
            plan: stub.clone(),
        },
    }
}

/// Stand-in body for a section no provider could write. Long enough to clear
/// the default sanitizer thresholds so the outline still reaches the reader.
fn placeholder_body(topic: &str, stub: &SectionPlan) -> String {
    let mut body = format!("<p><strong>{}</strong></p>", escape_html(&stub.title));
    if !stub.description.trim().is_empty() {
        body.push_str(&format!("<p>{}</p>", escape_html(&stub.description)));
    }
    body.push_str(&format!(
        "<p>This part of our look at {} is published as an outline. The full write-up \
         was not ready in time for this edition, so the points above stand in for it.</p>",
        escape_html(topic)
    ));
    body
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Build the prompt for stub `index` of `total`.
pub(crate) fn build_section_prompt(
    ctx: &JobContext,
    inputs: &SectionInputs<'_>,
    stub: &SectionPlan,
    index: usize,
    total: usize,
    written_titles: &[&str],
) -> String {
    let options = &ctx.options;
    let (min_words, max_words) = options.section_length.word_range();
    let position = Position::of(index, total);

    let mut prompt = format!(
        "Newsletter topic: {topic}\n\
         Newsletter title: {headline}\n\
         Section {number} of {total}: {title}\n\
         Section goal: {goal}\n\
         Tone and approach: {tone}\n\n\
         {position}\n",
        topic = options.topic,
        headline = inputs.plan.title,
        number = index + 1,
        title = stub.title,
        goal = stub.description,
        tone = tone_summary(&options.presets),
        position = position.instructions(),
    );

    if written_titles.is_empty() {
        prompt.push_str("\nNo sections have been written yet.\n");
    } else {
        prompt.push_str("\nSections already written (continue from them, do not repeat them):\n");
        for title in written_titles {
            prompt.push_str(&format!("- {title}\n"));
        }
    }

    if !inputs.research.trim().is_empty() {
        let excerpt = research_excerpt(inputs.research, ctx.generation.research_excerpt_chars);
        prompt.push_str(&format!("\nResearch notes:\n{excerpt}\n"));
    }

    if !inputs.knowledge.is_empty() {
        prompt.push_str("\nOrganization knowledge you may draw on:\n");
        for snippet in inputs.knowledge.iter().take(SNIPPETS_PER_SECTION) {
            prompt.push_str(&format!("- {}: {}\n", snippet.title, snippet.content.trim()));
        }
    }

    let events = relevant_events(inputs.events, &stub.title, EVENTS_PER_SECTION);
    if !events.is_empty() {
        prompt.push_str("\nUpcoming events to mention where they fit naturally:\n");
        for event in events {
            prompt.push_str(&format!(
                "- {} ({})",
                event.title,
                event.starts_at.format("%B %-d, %Y")
            ));
            if let Some(location) = &event.location {
                prompt.push_str(&format!(", {location}"));
            }
            prompt.push('\n');
        }
    }

    if let Some(instructions) = &options.instructions {
        prompt.push_str(&format!("\nAdditional instructions: {instructions}\n"));
    }

    prompt.push_str(&format!(
        "\nRules:\n\
         - Do not greet the reader, introduce yourself, or open with phrases like \
         \"In today's fast-paced world\" or \"Let's dive in\".\n\
         - Do not repeat the section title as a heading.\n\
         - Use only <p>, <ul>, <li>, and <strong> markup. No Markdown, no code fences.\n\
         - Write between {min_words} and {max_words} words.\n"
    ));

    prompt
}
