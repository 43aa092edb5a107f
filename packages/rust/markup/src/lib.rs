//! Content sanitizer and document export for Letterpress.
//!
//! Generated section bodies are untrusted free-form text. [`sanitize_markup`]
//! reduces each body to an element allowlist, runs the ordered
//! [`rules::RULES`] over it, then [`sanitize_sections`] drops sections that
//! are left with too little usable content.

mod allowlist;
mod export;
pub mod rules;

use std::sync::LazyLock;

use letterpress_shared::{GenerationConfig, Section};
use regex::Regex;
use scraper::Html;
use tracing::{debug, instrument};

pub use export::{ExportFormat, escape_html, export, render_html, render_markdown};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Thresholds below which a section is excluded from the document.
#[derive(Debug, Clone, Copy)]
pub struct SanitizeOptions {
    /// Minimum visible characters once markup is stripped.
    pub min_chars: usize,
    /// Minimum length of the sanitized markup, in bytes.
    pub min_bytes: usize,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for SanitizeOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            min_chars: config.min_section_chars,
            min_bytes: config.min_section_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// Sanitizer
// ---------------------------------------------------------------------------

/// Clean one section body: keep only allowlisted markup, apply every rule in
/// order, then make sure bare text ends up inside paragraphs.
pub fn sanitize_markup(raw: &str) -> String {
    let mut result = allowlist::allowlist(&raw.replace("\r\n", "\n"));
    for rule in rules::RULES.iter() {
        result = rule.apply(&result);
    }
    wrap_bare_paragraphs(result.trim())
}

/// Clean a section title: trims and drops leaked Markdown heading/emphasis marks.
pub fn sanitize_title(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('#')
        .trim_matches(|c| c == '*' || c == '"')
        .trim()
        .to_string()
}

/// Sanitize every section and drop the ones below the usable-content thresholds.
///
/// The returned list may be shorter than the input.
#[instrument(skip_all, fields(sections = sections.len()))]
pub fn sanitize_sections(sections: Vec<Section>, opts: &SanitizeOptions) -> Vec<Section> {
    sections
        .into_iter()
        .filter_map(|mut section| {
            section.title = sanitize_title(&section.title);
            section.content = sanitize_markup(&section.content);

            let visible = visible_text(&section.content).chars().count();
            if section.title.is_empty()
                || section.content.len() < opts.min_bytes
                || visible < opts.min_chars
            {
                debug!(
                    id = %section.id,
                    title = %section.title,
                    bytes = section.content.len(),
                    visible,
                    "dropping section below content threshold"
                );
                return None;
            }
            Some(section)
        })
        .collect()
}

/// Text content of a markup fragment with whitespace collapsed.
pub fn visible_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wrap blank-line separated plain text blocks in `<p>` when the body has no
/// block-level markup at all.
fn wrap_bare_paragraphs(markup: &str) -> String {
    static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)<(?:p|ul|ol|h[1-6]|blockquote|table|div)[\s>]").expect("valid regex")
    });

    if markup.is_empty() || BLOCK_RE.is_match(markup) {
        return markup.to_string();
    }

    markup
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| format!("<p>{block}</p>"))
        .collect::<Vec<_>>()
        .join("\n")
}
