//! Application configuration for Letterpress.
//!
//! User config lives at `~/.letterpress/letterpress.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LetterpressError, Result};
use crate::types::ProviderCategory;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "letterpress.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".letterpress";

// ---------------------------------------------------------------------------
// Config structs (matching letterpress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Brand header/footer settings.
    #[serde(default)]
    pub brand: BrandConfig,

    /// Generation thresholds and caps.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Knowledge similarity-search collaborator.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Configured providers, in priority order.
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the job database.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Organization that owns jobs, knowledge items, and events.
    #[serde(default = "default_organization_id")]
    pub organization_id: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            organization_id: default_organization_id(),
        }
    }
}

impl DefaultsConfig {
    /// The database path with a leading `~/` expanded to the home directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        match self.database_path.strip_prefix("~/") {
            Some(rest) => {
                let home = dirs::home_dir().ok_or_else(|| {
                    LetterpressError::config("could not determine home directory")
                })?;
                Ok(home.join(rest))
            }
            None => Ok(PathBuf::from(&self.database_path)),
        }
    }
}

fn default_database_path() -> String {
    "~/.letterpress/letterpress.db".into()
}
fn default_organization_id() -> String {
    "default".into()
}

/// `[brand]` section. Every field is optional; the assembler has defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<FooterLinkConfig>,
}

/// `[[brand.links]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FooterLinkConfig {
    pub label: String,
    pub url: String,
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sections whose visible text is shorter than this are dropped.
    #[serde(default = "default_min_section_chars")]
    pub min_section_chars: usize,

    /// Sections whose sanitized markup is shorter than this are dropped.
    #[serde(default = "default_min_section_bytes")]
    pub min_section_bytes: usize,

    /// How much research text each section prompt receives.
    #[serde(default = "default_research_excerpt_chars")]
    pub research_excerpt_chars: usize,

    /// Upcoming events loaded per job.
    #[serde(default = "default_max_events")]
    pub max_events: u32,

    /// Knowledge snippets requested per job.
    #[serde(default = "default_knowledge_limit")]
    pub knowledge_limit: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_section_chars: default_min_section_chars(),
            min_section_bytes: default_min_section_bytes(),
            research_excerpt_chars: default_research_excerpt_chars(),
            max_events: default_max_events(),
            knowledge_limit: default_knowledge_limit(),
        }
    }
}

fn default_min_section_chars() -> usize {
    80
}
fn default_min_section_bytes() -> usize {
    50
}
fn default_research_excerpt_chars() -> usize {
    1_500
}
fn default_max_events() -> u32 {
    10
}
fn default_knowledge_limit() -> u32 {
    5
}

/// `[knowledge]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Base URL of the similarity-search service. When absent, only the
    /// local substring search is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// `[[providers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub name: String,
    /// Explicit API family; inferred from `name` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub category: ProviderCategory,
    /// Name of the env var holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Inline API key; `api_key_env` is preferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl ProviderEntry {
    /// Resolve the credential: inline key first, then the named env var.
    /// Returns an empty string when neither yields a value.
    pub fn resolve_credential(&self) -> String {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return key.to_string();
        }
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.letterpress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LetterpressError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.letterpress/letterpress.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LetterpressError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LetterpressError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LetterpressError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LetterpressError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LetterpressError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check cross-field constraints that serde defaults cannot express.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.generation.min_section_chars == 0 {
        return Err(LetterpressError::config(
            "generation.min_section_chars must be greater than zero",
        ));
    }

    for link in &config.brand.links {
        Url::parse(&link.url).map_err(|e| {
            LetterpressError::config(format!("brand link '{}' has invalid url: {e}", link.label))
        })?;
    }

    if let Some(endpoint) = &config.knowledge.endpoint {
        Url::parse(endpoint).map_err(|e| {
            LetterpressError::config(format!("knowledge.endpoint is not a valid url: {e}"))
        })?;
    }

    let mut seen = std::collections::HashSet::new();
    for entry in &config.providers {
        if !seen.insert(entry.id.as_str()) {
            return Err(LetterpressError::config(format!(
                "duplicate provider id '{}'",
                entry.id
            )));
        }
    }

    Ok(())
}
