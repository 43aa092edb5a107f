//! Provider fallback executor.
//!
//! [`try_providers`] walks an ordered provider list, skipping providers
//! without a usable credential, and returns the first success. Calls are
//! strictly sequential: provider 2 is only tried after provider 1 failed.

use std::future::Future;

use letterpress_providers::ProviderError;
use letterpress_shared::{LetterpressError, Provider};
use tracing::{debug, info, warn};

/// Why a whole fallback chain failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FallbackError {
    /// The list was empty, or every provider lacked a credential.
    #[error("no providers available for {label}")]
    NoProviders { label: String },

    /// Every usable provider was tried and failed. Carries the last error.
    #[error("all {attempts} provider(s) failed for {label}; last error: {last}")]
    Exhausted {
        label: String,
        attempts: usize,
        last: ProviderError,
    },
}

impl From<FallbackError> for LetterpressError {
    fn from(e: FallbackError) -> Self {
        match e {
            FallbackError::NoProviders { .. } => LetterpressError::config(e.to_string()),
            FallbackError::Exhausted { .. } => LetterpressError::Exhausted(e.to_string()),
        }
    }
}

/// The first successful result and the provider that produced it.
#[derive(Debug)]
pub struct Success<'a, T> {
    pub value: T,
    pub provider: &'a Provider,
    /// Providers actually invoked, including the successful one.
    pub attempts: usize,
}

/// Run `op` against each provider in order until one succeeds.
pub async fn try_providers<'a, T, F, Fut>(
    providers: &'a [Provider],
    label: &str,
    mut op: F,
) -> Result<Success<'a, T>, FallbackError>
where
    F: FnMut(&'a Provider) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempts = 0;
    let mut last_error = None;

    for provider in providers {
        if !provider.has_credential() {
            debug!(label, provider = %provider.name, "skipping provider without credential");
            continue;
        }

        attempts += 1;
        match op(provider).await {
            Ok(value) => {
                info!(label, provider = %provider.name, attempt = attempts, "provider succeeded");
                return Ok(Success {
                    value,
                    provider,
                    attempts,
                });
            }
            Err(e) => {
                if e.is_terminal() {
                    warn!(
                        label,
                        provider = %provider.name,
                        category = e.category(),
                        error = %e,
                        "provider needs operator attention"
                    );
                } else {
                    warn!(label, provider = %provider.name, error = %e, "provider failed");
                }
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(last) => Err(FallbackError::Exhausted {
            label: label.to_string(),
            attempts,
            last,
        }),
        None => Err(FallbackError::NoProviders {
            label: label.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterpress_shared::{ProviderCategory, ProviderKind};

    fn provider(id: &str, credential: &str) -> Provider {
        Provider {
            id: id.into(),
            name: id.into(),
            kind: ProviderKind::OpenAi,
            category: ProviderCategory::Generation,
            credential: credential.into(),
            settings: serde_json::Map::new(),
            active: true,
        }
    }

    #[tokio::test]
    async fn empty_list_is_no_providers() {
        let result = try_providers(&[], "plan", |_p| async { Ok::<_, ProviderError>(1) }).await;
        assert!(matches!(result, Err(FallbackError::NoProviders { .. })));
    }

    #[tokio::test]
    async fn all_blank_credentials_is_no_providers() {
        let providers = [provider("a", ""), provider("b", "   ")];
        let mut calls = 0;
        let result = try_providers(&providers, "plan", |_p| {
            calls += 1;
            async { Ok::<_, ProviderError>(()) }
        })
        .await;
        assert!(matches!(result, Err(FallbackError::NoProviders { .. })));
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn tries_in_order_and_stops_at_first_success() {
        let providers = [
            provider("first", "k1"),
            provider("second", "k2"),
            provider("third", "k3"),
        ];
        let mut seen = Vec::new();
        let result = try_providers(&providers, "section", |p| {
            seen.push(p.id.clone());
            let fail = p.id == "first";
            let id = p.id.clone();
            async move {
                if fail {
                    Err(ProviderError::Network("connection reset".into()))
                } else {
                    Ok(id)
                }
            }
        })
        .await
        .expect("second succeeds");

        assert_eq!(seen, ["first", "second"]);
        assert_eq!(result.value, "second");
        assert_eq!(result.provider.id, "second");
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn blank_credential_is_skipped_not_counted() {
        let providers = [provider("broken", ""), provider("healthy", "k")];
        let mut seen = Vec::new();
        let result = try_providers(&providers, "section", |p| {
            seen.push(p.id.clone());
            async { Ok::<_, ProviderError>("ok") }
        })
        .await
        .expect("healthy succeeds");

        assert_eq!(seen, ["healthy"]);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn exhaustion_carries_last_error() {
        let providers = [provider("a", "k"), provider("skip", ""), provider("b", "k")];
        let result = try_providers(&providers, "research", |p| {
            let err = if p.id == "a" {
                ProviderError::Auth("bad key".into())
            } else {
                ProviderError::RateLimited("slow down".into())
            };
            async move { Err::<(), _>(err) }
        })
        .await;

        match result {
            Err(FallbackError::Exhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 2);
                assert_eq!(last, ProviderError::RateLimited("slow down".into()));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn fallback_error_maps_to_letterpress_error() {
        let err: LetterpressError = FallbackError::NoProviders {
            label: "plan".into(),
        }
        .into();
        assert!(matches!(err, LetterpressError::Config { .. }));
    }
}
