//! Preset ids and the instruction text they expand to.
//!
//! Known ids map to fixed text. Unknown ids are embedded as given, so a
//! free-form value like "playful but precise" still reaches the model.

use letterpress_shared::Presets;

const TONES: &[(&str, &str)] = &[
    ("professional", "Professional and polished. Confident, precise, free of slang."),
    ("friendly", "Warm and approachable, like a knowledgeable colleague."),
    ("authoritative", "Authoritative and expert. Back claims with specifics."),
    ("witty", "Light and witty, with the occasional clever turn of phrase. Never flippant."),
    ("inspirational", "Optimistic and energizing. Focus on possibility and momentum."),
];

const STYLES: &[(&str, &str)] = &[
    ("concise", "Short sentences, tight paragraphs, no filler."),
    ("storytelling", "Lead with concrete scenes and examples, then draw out the point."),
    ("analytical", "Structured reasoning with data points, comparisons, and implications."),
    ("conversational", "Plain language, direct address, natural rhythm."),
];

const AUDIENCES: &[(&str, &str)] = &[
    ("general", "A general audience. Define jargon the first time it appears."),
    ("executives", "Busy executives. Lead with business impact and decisions."),
    ("developers", "Software developers. Technical depth is welcome."),
    ("marketers", "Marketing professionals. Emphasize audience, channels, and results."),
    ("researchers", "Researchers and analysts. Precision and sourcing matter."),
];

const CONTEXTS: &[(&str, &str)] = &[
    ("industry_news", "A weekly industry news briefing."),
    ("internal_update", "An internal update for the organization's own staff."),
    ("product_launch", "A launch announcement that explains what is new and why it matters."),
    ("educational", "An educational series that teaches one idea well."),
];

const STRUCTURES: &[(&str, &str)] = &[
    ("listicle", "Each section is a numbered, self-contained takeaway."),
    ("deep_dive", "One thread explored in depth, each section going a level deeper."),
    ("news_roundup", "A roundup: each section covers a distinct development."),
    ("how_to", "A practical guide: context first, then steps, then pitfalls."),
    ("problem_solution", "Frame the problem, explore causes, then present solutions."),
];

fn expand(table: &[(&str, &'static str)], id: &str) -> String {
    let key = id.trim().to_lowercase().replace(['-', ' '], "_");
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, text)| (*text).to_string())
        .unwrap_or_else(|| id.trim().to_string())
}

/// Instruction lines for every preset that was selected, one per line.
///
/// Empty when no preset was chosen.
pub fn preset_instructions(presets: &Presets) -> String {
    let selected = [
        ("Tone", TONES, presets.tone.as_deref()),
        ("Writing style", STYLES, presets.style.as_deref()),
        ("Audience", AUDIENCES, presets.audience.as_deref()),
        ("Context", CONTEXTS, presets.context.as_deref()),
        ("Structure", STRUCTURES, presets.structure.as_deref()),
    ];

    selected
        .into_iter()
        .filter_map(|(label, table, id)| {
            let id = id.filter(|s| !s.trim().is_empty())?;
            Some(format!("- {label}: {}", expand(table, id)))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Short tone summary for the per-section prompt.
pub fn tone_summary(presets: &Presets) -> String {
    presets
        .tone
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|id| expand(TONES, id))
        .unwrap_or_else(|| "Clear, informative, and engaging.".to_string())
}
