//! Resolve configured providers into usable, typed [`Provider`]s.
//!
//! Provider kind is resolved exactly once here. Everything downstream
//! dispatches on [`ProviderKind`], never on names.

use letterpress_shared::{
    LetterpressError, Provider, ProviderCategory, ProviderEntry, ProviderKind, Result,
};
use tracing::{debug, warn};

/// Active, credentialed providers split by category, in priority order.
#[derive(Debug, Clone, Default)]
pub struct ProviderSet {
    pub research: Vec<Provider>,
    pub generation: Vec<Provider>,
    /// Entries left out, with the reason.
    pub skipped: Vec<SkippedProvider>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProvider {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Inactive,
    MissingCredential,
    UnknownKind(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => f.write_str("inactive"),
            Self::MissingCredential => f.write_str("missing or empty credential"),
            Self::UnknownKind(kind) => write!(f, "unknown provider kind '{kind}'"),
        }
    }
}

impl ProviderSet {
    /// Build the set from config entries.
    pub fn from_entries(entries: &[ProviderEntry]) -> Self {
        let mut set = Self::default();

        for entry in entries {
            match resolve_entry(entry) {
                Ok(provider) => {
                    debug!(provider = %provider.name, kind = %provider.kind, "provider usable");
                    match provider.category {
                        ProviderCategory::Research => set.research.push(provider),
                        ProviderCategory::Generation => set.generation.push(provider),
                    }
                }
                Err(reason) => {
                    warn!(provider = %entry.name, %reason, "skipping provider");
                    set.skipped.push(SkippedProvider {
                        name: entry.name.clone(),
                        reason,
                    });
                }
            }
        }

        set
    }

    /// Fail with a configuration error when no generation provider is usable.
    pub fn require_generation(&self) -> Result<()> {
        if self.generation.is_empty() {
            return Err(LetterpressError::config("no generation providers available"));
        }
        Ok(())
    }
}

/// Resolve one entry, or say why it is unusable.
pub fn resolve_entry(entry: &ProviderEntry) -> std::result::Result<Provider, SkipReason> {
    if !entry.active {
        return Err(SkipReason::Inactive);
    }

    let kind = match &entry.kind {
        Some(explicit) => explicit
            .parse::<ProviderKind>()
            .map_err(|_| SkipReason::UnknownKind(explicit.clone()))?,
        None => ProviderKind::infer_from_name(&entry.name)
            .ok_or_else(|| SkipReason::UnknownKind(entry.name.clone()))?,
    };

    let credential = entry.resolve_credential();
    if credential.trim().is_empty() {
        return Err(SkipReason::MissingCredential);
    }

    Ok(Provider {
        id: entry.id.clone(),
        name: entry.name.clone(),
        kind,
        category: entry.category,
        credential,
        settings: entry.settings.clone(),
        active: entry.active,
    })
}
