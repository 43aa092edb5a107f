//! Topic planner: topic + options → [`ContentPlan`] with exactly N sections.

use letterpress_providers::{CompletionRequest, ProviderError};
use letterpress_shared::{ContentPlan, GenerationOptions, SectionPlan, SectionType};
use tracing::{info, instrument, warn};

use crate::context::JobContext;
use crate::executor::try_providers;
use crate::presets::preset_instructions;

/// A plan plus where it came from.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: ContentPlan,
    /// Provider that produced the plan, or `None` for the heuristic fallback.
    pub provider: Option<String>,
}

/// Plan the newsletter. Never fails: total provider failure falls back to a
/// keyword-selected template.
#[instrument(skip_all, fields(topic = %ctx.topic(), sections = ctx.options.num_sections))]
pub async fn plan_topic(ctx: &JobContext) -> PlanOutcome {
    let request = CompletionRequest::new(build_plan_prompt(&ctx.options))
        .with_system("You are an expert newsletter editor. Respond with a single JSON object.")
        .json();
    let registry = &ctx.registry;
    let request = &request;

    let result = try_providers(&ctx.providers.generation, "plan", |provider| async move {
        let text = registry.generate(provider, request).await?;
        parse_plan(&text)
    })
    .await;

    let (plan, provider) = match result {
        Ok(success) => (success.value, Some(success.provider.name.clone())),
        Err(e) => {
            warn!(error = %e, "planning failed on every provider, using heuristic plan");
            (heuristic_plan(&ctx.options.topic, ctx.options.num_sections), None)
        }
    };

    let plan = finalize_plan(plan, &ctx.options.topic, ctx.options.num_sections);
    info!(title = %plan.title, sections = plan.sections.len(), "plan ready");
    PlanOutcome { plan, provider }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

fn build_plan_prompt(options: &GenerationOptions) -> String {
    let n = options.num_sections;
    let mut prompt = format!(
        "Plan a newsletter about: {topic}\n\n\
         Requirements:\n\
         - Write a specific, benefit-oriented title. Do not simply restate the topic.\n\
         - Write a one-sentence subtitle.\n\
         - Produce exactly {n} sections. Each covers a distinct angle.\n\
         - Order the sections as one continuous narrative: each builds on the previous one.\n\
         - No greetings or re-introductions in any section.\n\
         - Section types: hero (opening), article, events, knowledge, summary (closing).\n",
        topic = options.topic,
    );

    let presets = preset_instructions(&options.presets);
    if !presets.is_empty() {
        prompt.push_str("\nFollow these editorial settings exactly:\n");
        prompt.push_str(&presets);
        prompt.push('\n');
    }
    if let Some(instructions) = &options.instructions {
        prompt.push_str("\nAdditional instructions from the editor:\n");
        prompt.push_str(instructions);
        prompt.push('\n');
    }

    prompt.push_str(
        "\nRespond with JSON only, in this shape:\n\
         {\"title\": \"...\", \"subtitle\": \"...\", \"sections\": [\
         {\"type\": \"hero\", \"title\": \"...\", \"description\": \"...\"}]}\n",
    );
    prompt
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a provider answer into a plan. Missing fields count as a provider
/// failure so the executor moves on to the next provider.
pub(crate) fn parse_plan(text: &str) -> Result<ContentPlan, ProviderError> {
    let json = extract_json_object(text)
        .ok_or_else(|| ProviderError::InvalidResponse("no JSON object in plan response".into()))?;

    let plan: ContentPlan = serde_json::from_str(json)
        .map_err(|e| ProviderError::InvalidResponse(format!("malformed plan: {e}")))?;

    if plan.title.trim().is_empty() {
        return Err(ProviderError::InvalidResponse("plan has no title".into()));
    }
    if plan.sections.is_empty() {
        return Err(ProviderError::InvalidResponse("plan has no sections".into()));
    }
    if plan.sections.iter().any(|s| s.title.trim().is_empty()) {
        return Err(ProviderError::InvalidResponse("plan section without title".into()));
    }
    Ok(plan)
}

/// The outermost `{ ... }` span, ignoring fences or prose around it.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ---------------------------------------------------------------------------
// Heuristic fallback
// ---------------------------------------------------------------------------

struct PlanTemplate {
    keywords: &'static [&'static str],
    title: &'static str,
    subtitle: &'static str,
    angles: &'static [(&'static str, &'static str)],
}

// First match wins; the last entry has no keywords and always matches.
const TEMPLATES: &[PlanTemplate] = &[
    PlanTemplate {
        keywords: &["how to", "guide", "tutorial"],
        title: "A Practical Playbook for {topic}",
        subtitle: "Step-by-step guidance you can put to work this week",
        angles: &[
            ("Why {topic} matters now", "Set up the problem and the payoff"),
            ("Getting started", "The first concrete steps"),
            ("Step by step", "Walk through the core process"),
            ("Common pitfalls", "Mistakes to avoid and how to recover"),
            ("Tools and resources", "What makes the work easier"),
            ("Putting it together", "Recap and next actions"),
        ],
    },
    PlanTemplate {
        keywords: &["top ", "best ", "list"],
        title: "The Essential Shortlist: {topic}",
        subtitle: "The picks worth your attention, and why",
        angles: &[
            ("The headline pick", "Open with the standout entry"),
            ("The strong contender", "A close second and its trade-offs"),
            ("The underrated option", "What most people overlook"),
            ("The newcomer", "A fresh entry worth watching"),
            ("How to choose", "Match the picks to your needs"),
        ],
    },
    PlanTemplate {
        keywords: &["trend", "future", "forecast", "outlook", "2025", "2026"],
        title: "Where {topic} Is Heading Next",
        subtitle: "The shifts shaping the months ahead",
        angles: &[
            ("The shift underway", "Frame the change that is happening"),
            ("What is driving it", "Forces behind the trend"),
            ("Who is moving first", "Early adopters and their results"),
            ("Risks and open questions", "What could slow it down"),
            ("What to watch", "Signals for the months ahead"),
        ],
    },
    PlanTemplate {
        keywords: &["price", "cost", "money", "invest", "market", "funding", "budget", "finance", "$"],
        title: "Following the Money in {topic}",
        subtitle: "Costs, returns, and where the smart money is going",
        angles: &[
            ("The numbers at a glance", "Open with the key figures"),
            ("Where the money flows", "Who is spending and on what"),
            ("Costs versus returns", "What the investment actually buys"),
            ("Risks to the bottom line", "What could change the math"),
            ("Making the call", "How to decide with these numbers"),
        ],
    },
    PlanTemplate {
        keywords: &[],
        title: "{topic}, Explained: What You Need to Know",
        subtitle: "An informational breakdown of the essentials",
        angles: &[
            ("The big picture", "Why this topic matters now"),
            ("Key developments", "What has changed recently"),
            ("A closer look", "The details behind the headlines"),
            ("Practical implications", "What it means for readers"),
            ("Looking ahead", "What to watch next"),
        ],
    },
];

fn select_template(topic: &str) -> &'static PlanTemplate {
    let lower = topic.to_lowercase();
    TEMPLATES
        .iter()
        .find(|t| t.keywords.is_empty() || t.keywords.iter().any(|k| lower.contains(k)))
        .unwrap_or(&TEMPLATES[TEMPLATES.len() - 1])
}

/// Deterministic plan from the keyword-matched template.
pub(crate) fn heuristic_plan(topic: &str, n: usize) -> ContentPlan {
    let template = select_template(topic);
    let sections = (0..n)
        .map(|i| {
            let (title, description) = template.angles[i % template.angles.len()];
            let round = i / template.angles.len();
            let title = title.replace("{topic}", topic);
            SectionPlan {
                section_type: position_type(i, n),
                title: if round == 0 {
                    title
                } else {
                    format!("{title} (part {})", round + 1)
                },
                description: description.to_string(),
            }
        })
        .collect();

    ContentPlan {
        title: template.title.replace("{topic}", topic),
        subtitle: template.subtitle.to_string(),
        sections,
    }
}

fn position_type(i: usize, n: usize) -> SectionType {
    if i == 0 {
        SectionType::Hero
    } else if i + 1 == n {
        SectionType::Summary
    } else {
        SectionType::Article
    }
}

// ---------------------------------------------------------------------------
// Invariant enforcement
// ---------------------------------------------------------------------------

/// Pad or truncate to exactly `n` sections and make sure the title is not a
/// restatement of the topic.
pub(crate) fn finalize_plan(mut plan: ContentPlan, topic: &str, n: usize) -> ContentPlan {
    plan.sections.truncate(n);
    while plan.sections.len() < n {
        let i = plan.sections.len();
        plan.sections.push(SectionPlan {
            section_type: SectionType::Article,
            title: format!("Key angle {}", i + 1),
            description: format!("Another perspective on {topic}"),
        });
    }

    let title = plan.title.trim();
    if title.is_empty() || title.eq_ignore_ascii_case(topic.trim()) {
        plan.title = format!("{}: What You Need to Know", topic.trim());
    }
    plan
}
