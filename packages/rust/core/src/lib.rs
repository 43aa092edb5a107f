//! Generation pipeline and domain logic for Letterpress.
//!
//! This crate ties together provider fallback, planning, research,
//! knowledge retrieval, section generation, sanitization, and assembly into
//! one background job per request (see [`Generator`]).

pub mod assembler;
pub mod config_loader;
pub mod context;
pub mod events;
pub mod executor;
pub mod images;
pub mod knowledge;
pub mod pipeline;
pub mod planner;
pub mod presets;
pub mod reporter;
pub mod research;
pub mod sections;

pub use config_loader::{ProviderSet, SkipReason, SkippedProvider};
pub use context::JobContext;
pub use executor::{FallbackError, Success, try_providers};
pub use knowledge::{HttpKnowledgeSearch, KnowledgeSearch};
pub use pipeline::{Generator, JobHandle};
pub use reporter::{ProgressReporter, SilentProgress, Stage, StorageReporter};
