//! Content plan, section, and final document types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ImageSource;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// The role a section plays in the newsletter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Hero,
    #[default]
    Article,
    Events,
    Knowledge,
    Summary,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Article => "article",
            Self::Events => "events",
            Self::Knowledge => "knowledge",
            Self::Summary => "summary",
        }
    }
}

/// A planned section stub, produced before any body text is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlan {
    #[serde(rename = "type", default)]
    pub section_type: SectionType,
    pub title: String,
    pub description: String,
}

/// The structured outline of a newsletter.
///
/// After the planner returns, `sections.len()` equals the requested count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPlan {
    pub title: String,
    pub subtitle: String,
    pub sections: Vec<SectionPlan>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// An image attached to a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub alt: String,
    pub source: ImageSource,
}

/// Bookkeeping recorded alongside each generated section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub generated_at: DateTime<Utc>,
    /// `true` when every provider failed and the placeholder body was used.
    #[serde(default)]
    pub fallback_used: bool,
    /// Name of the provider that produced the body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub plan: SectionPlan,
}

/// One sub-unit of the final document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub title: String,
    /// Lightweight HTML markup (`<p>`, `<ul>`, `<strong>`, ...).
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    pub metadata: SectionMetadata,
}

// ---------------------------------------------------------------------------
// Final document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub title: String,
    pub subtitle: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FooterLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFooter {
    pub text: String,
    #[serde(default)]
    pub links: Vec<FooterLink>,
}

/// The assembled newsletter. Written once, at terminal success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDocument {
    pub header: DocumentHeader,
    pub sections: Vec<Section>,
    pub footer: DocumentFooter,
}
