//! Job, request, and provider types for Letterpress.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::FinalDocument;
use crate::error::{LetterpressError, Result};

/// Upper bound on the number of sections a single job may request.
pub const MAX_SECTIONS: usize = 10;

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for generation job identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new time-sortable job identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Lifecycle state of a generation job.
///
/// `Generating` is the only non-terminal state; `Ready` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Generating,
    Ready,
    Failed,
}

impl JobStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Generating)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = LetterpressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "generating" => Ok(Self::Generating),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(LetterpressError::parse(format!("unknown job status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// How much the caller wants to control generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Three short sections.
    #[default]
    Quick,
    /// Five long sections.
    Detailed,
    /// Caller-specified section count and length.
    Custom,
}

impl GenerationMode {
    fn default_sections(&self) -> usize {
        match self {
            Self::Quick => 3,
            Self::Detailed => 5,
            Self::Custom => 4,
        }
    }

    fn default_length(&self) -> SectionLength {
        match self {
            Self::Quick => SectionLength::Short,
            Self::Detailed => SectionLength::Long,
            Self::Custom => SectionLength::Medium,
        }
    }
}

impl FromStr for GenerationMode {
    type Err = LetterpressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "quick" => Ok(Self::Quick),
            "detailed" => Ok(Self::Detailed),
            "custom" => Ok(Self::Custom),
            other => Err(LetterpressError::validation(format!(
                "unknown mode '{other}': expected quick, detailed, or custom"
            ))),
        }
    }
}

/// Target length of each generated section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SectionLength {
    /// Inclusive word-count band requested from the model.
    pub fn word_range(&self) -> (u32, u32) {
        match self {
            Self::Short => (120, 200),
            Self::Medium => (250, 400),
            Self::Long => (450, 650),
        }
    }
}

impl FromStr for SectionLength {
    type Err = LetterpressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(LetterpressError::validation(format!(
                "unknown section length '{other}': expected short, medium, or long"
            ))),
        }
    }
}

/// Where images come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// AI image generation, falling back to the stock catalog.
    Ai,
    /// Deterministic stock catalog only.
    #[default]
    Web,
}

impl FromStr for ImageSource {
    type Err = LetterpressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ai" => Ok(Self::Ai),
            "web" => Ok(Self::Web),
            other => Err(LetterpressError::validation(format!(
                "unknown image source '{other}': expected ai or web"
            ))),
        }
    }
}

/// Which sections receive an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePlacement {
    #[default]
    All,
    /// Only the opening section.
    Header,
}

impl FromStr for ImagePlacement {
    type Err = LetterpressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "header" => Ok(Self::Header),
            other => Err(LetterpressError::validation(format!(
                "unknown image placement '{other}': expected all or header"
            ))),
        }
    }
}

/// The job creation request as received from the intake layer.
///
/// Everything except `topic`, `mode`, `include_events`, and `include_knowledge`
/// is optional; [`GenerationRequest::resolve`] fills in mode defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub skip_research: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_sections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_length: Option<SectionLength>,
    #[serde(default)]
    pub include_images: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_source: Option<ImageSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_placement: Option<ImagePlacement>,
    #[serde(default)]
    pub include_events: bool,
    #[serde(default)]
    pub include_knowledge: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide: Option<String>,
}

impl GenerationRequest {
    /// Convenience constructor for a request with only a topic and mode.
    pub fn new(topic: impl Into<String>, mode: GenerationMode) -> Self {
        Self {
            topic: topic.into(),
            mode,
            ..Default::default()
        }
    }

    /// Validate the request and apply mode defaults.
    pub fn resolve(self) -> Result<GenerationOptions> {
        let topic = self.topic.trim().to_string();
        if topic.is_empty() {
            return Err(LetterpressError::validation("topic must not be empty"));
        }

        let num_sections = self
            .num_sections
            .unwrap_or_else(|| self.mode.default_sections());
        if num_sections == 0 || num_sections > MAX_SECTIONS {
            return Err(LetterpressError::validation(format!(
                "num_sections must be between 1 and {MAX_SECTIONS}, got {num_sections}"
            )));
        }

        let images = self.include_images.then(|| ImageOptions {
            source: self.image_source.unwrap_or_default(),
            placement: self.image_placement.unwrap_or_default(),
        });

        Ok(GenerationOptions {
            topic,
            mode: self.mode,
            instructions: self.instructions.filter(|s| !s.trim().is_empty()),
            skip_research: self.skip_research,
            num_sections,
            section_length: self
                .section_length
                .unwrap_or_else(|| self.mode.default_length()),
            images,
            include_events: self.include_events,
            include_knowledge: self.include_knowledge,
            presets: Presets {
                tone: self.tone,
                style: self.style,
                audience: self.audience,
                context: self.context,
                structure: self.guide,
            },
        })
    }
}

/// Image settings, present only when images were requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub source: ImageSource,
    pub placement: ImagePlacement,
}

/// Preset ids selected by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
}

/// Fully resolved generation options carried by a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub topic: String,
    pub mode: GenerationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub skip_research: bool,
    pub num_sections: usize,
    pub section_length: SectionLength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageOptions>,
    pub include_events: bool,
    pub include_knowledge: bool,
    #[serde(default)]
    pub presets: Presets,
}

// ---------------------------------------------------------------------------
// GenerationJob
// ---------------------------------------------------------------------------

/// One timestamped, human-readable job log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// A generation request's full lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: JobId,
    pub organization_id: String,
    pub topic: String,
    pub options: GenerationOptions,
    pub status: JobStatus,
    /// Percentage in `0..=100`; never decreases.
    pub progress: u8,
    pub logs: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<FinalDocument>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    /// A fresh job in `generating` state with one "queued" log line.
    pub fn new(organization_id: impl Into<String>, options: GenerationOptions) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            organization_id: organization_id.into(),
            topic: options.topic.clone(),
            options,
            status: JobStatus::Generating,
            progress: 0,
            logs: vec![LogEntry::now("Job queued")],
            content: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// What a provider is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    Research,
    Generation,
}

impl ProviderCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Generation => "generation",
        }
    }
}

/// The concrete API family a provider speaks, resolved once at config load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    OpenRouter,
    Perplexity,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::Perplexity => "perplexity",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Infer the kind from a display name (e.g. "OpenAI GPT-4o", "Claude").
    ///
    /// Only used when a provider entry has no explicit `kind`.
    pub fn infer_from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("openrouter") {
            Some(Self::OpenRouter)
        } else if lower.contains("perplexity") {
            Some(Self::Perplexity)
        } else if lower.contains("anthropic") || lower.contains("claude") {
            Some(Self::Anthropic)
        } else if lower.contains("gemini") || lower.contains("google") {
            Some(Self::Gemini)
        } else if lower.contains("openai") || lower.contains("gpt") {
            Some(Self::OpenAi)
        } else {
            None
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LetterpressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "perplexity" => Ok(Self::Perplexity),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            other => Err(LetterpressError::config(format!(
                "unknown provider kind '{other}'"
            ))),
        }
    }
}

/// A configured external content/research adapter with a decrypted credential.
///
/// Priority is implicit: providers are tried in list order.
#[derive(Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub kind: ProviderKind,
    pub category: ProviderCategory,
    #[serde(skip_serializing, default)]
    pub credential: String,
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
    pub active: bool,
}

impl Provider {
    /// Whether the credential is present and not just whitespace.
    pub fn has_credential(&self) -> bool {
        !self.credential.trim().is_empty()
    }

    /// String setting lookup (e.g. `model`, `base_url`).
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    pub fn setting_f64(&self, key: &str) -> Option<f64> {
        self.settings.get(key).and_then(|v| v.as_f64())
    }

    pub fn setting_u64(&self, key: &str) -> Option<u64> {
        self.settings.get(key).and_then(|v| v.as_u64())
    }
}

// Credentials never reach logs.
impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("category", &self.category)
            .field("credential", &if self.has_credential() { "<set>" } else { "<empty>" })
            .field("settings", &self.settings)
            .field("active", &self.active)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Organization-owned reference data
// ---------------------------------------------------------------------------

/// A stored knowledge-base item owned by an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A knowledge query result, as returned by the similarity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub title: String,
    pub content: String,
}

impl From<KnowledgeItem> for KnowledgeSnippet {
    fn from(item: KnowledgeItem) -> Self {
        Self {
            title: item.title,
            content: item.content,
        }
    }
}

/// An organization event that may be promoted in a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_roundtrip() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().expect("parse JobId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn job_status_parse_and_terminal() {
        assert_eq!("ready".parse::<JobStatus>().unwrap(), JobStatus::Ready);
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Generating.is_terminal());
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn resolve_applies_mode_defaults() {
        let opts = GenerationRequest::new("AI in Healthcare", GenerationMode::Detailed)
            .resolve()
            .expect("resolve");
        assert_eq!(opts.num_sections, 5);
        assert_eq!(opts.section_length, SectionLength::Long);
        assert!(opts.images.is_none());
    }

    #[test]
    fn resolve_explicit_values_override_mode() {
        let request = GenerationRequest {
            num_sections: Some(2),
            section_length: Some(SectionLength::Short),
            include_images: true,
            image_placement: Some(ImagePlacement::Header),
            guide: Some("listicle".into()),
            ..GenerationRequest::new("Remote work", GenerationMode::Detailed)
        };
        let opts = request.resolve().expect("resolve");
        assert_eq!(opts.num_sections, 2);
        assert_eq!(opts.section_length, SectionLength::Short);
        let images = opts.images.expect("images requested");
        assert_eq!(images.source, ImageSource::Web);
        assert_eq!(images.placement, ImagePlacement::Header);
        assert_eq!(opts.presets.structure.as_deref(), Some("listicle"));
    }

    #[test]
    fn resolve_rejects_bad_input() {
        assert!(GenerationRequest::new("  ", GenerationMode::Quick).resolve().is_err());

        let zero = GenerationRequest {
            num_sections: Some(0),
            ..GenerationRequest::new("Topic", GenerationMode::Custom)
        };
        assert!(zero.resolve().is_err());

        let too_many = GenerationRequest {
            num_sections: Some(MAX_SECTIONS + 1),
            ..GenerationRequest::new("Topic", GenerationMode::Custom)
        };
        assert!(too_many.resolve().is_err());
    }

    #[test]
    fn request_deserializes_from_wire_json() {
        let json = r#"{"topic":"AI in Healthcare","mode":"custom","num_sections":4,
            "section_length":"long","include_events":true,"include_knowledge":false,
            "image_source":"ai","tone":"professional"}"#;
        let request: GenerationRequest = serde_json::from_str(json).expect("deserialize");
        assert_eq!(request.mode, GenerationMode::Custom);
        assert_eq!(request.num_sections, Some(4));
        assert_eq!(request.image_source, Some(ImageSource::Ai));
        assert!(request.include_events);
    }

    #[test]
    fn provider_kind_inference() {
        assert_eq!(ProviderKind::infer_from_name("OpenAI GPT-4o"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::infer_from_name("Claude Sonnet"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::infer_from_name("OpenRouter"), Some(ProviderKind::OpenRouter));
        assert_eq!(ProviderKind::infer_from_name("Perplexity Sonar"), Some(ProviderKind::Perplexity));
        assert_eq!(ProviderKind::infer_from_name("mystery box"), None);
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
    }

    #[test]
    fn provider_debug_redacts_credential() {
        let provider = Provider {
            id: "p1".into(),
            name: "OpenAI".into(),
            kind: ProviderKind::OpenAi,
            category: ProviderCategory::Generation,
            credential: "sk-secret-value".into(),
            settings: serde_json::Map::new(),
            active: true,
        };
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("<set>"));
    }

    #[test]
    fn blank_credential_is_not_usable() {
        let provider = Provider {
            id: "p1".into(),
            name: "OpenAI".into(),
            kind: ProviderKind::OpenAi,
            category: ProviderCategory::Generation,
            credential: "   ".into(),
            settings: serde_json::Map::new(),
            active: true,
        };
        assert!(!provider.has_credential());
    }
}
