//! Shared types, error model, and configuration for Letterpress.
//!
//! This crate is the foundation depended on by all other Letterpress crates.
//! It provides:
//! - [`LetterpressError`]: the unified error type
//! - Job types ([`GenerationJob`], [`GenerationRequest`], [`GenerationOptions`], [`JobId`])
//! - Provider types ([`Provider`], [`ProviderKind`], [`ProviderCategory`])
//! - Document types ([`ContentPlan`], [`Section`], [`FinalDocument`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod document;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrandConfig, DefaultsConfig, FooterLinkConfig, GenerationConfig, KnowledgeConfig,
    ProviderEntry, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_config,
};
pub use document::{
    ContentPlan, DocumentFooter, DocumentHeader, FinalDocument, FooterLink, ImageRef, Section,
    SectionMetadata, SectionPlan, SectionType,
};
pub use error::{LetterpressError, Result};
pub use types::{
    Event, GenerationJob, GenerationMode, GenerationOptions, GenerationRequest, ImageOptions,
    ImagePlacement, ImageSource, JobId, JobStatus, KnowledgeItem, KnowledgeSnippet, LogEntry,
    MAX_SECTIONS, Presets, Provider, ProviderCategory, ProviderKind, SectionLength,
};
