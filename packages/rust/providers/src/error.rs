//! Failure classification for a single provider call.

use reqwest::StatusCode;

/// Why one provider call failed.
///
/// Every variant is recoverable from the caller's point of view: the fallback
/// executor records it and moves on to the next provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The credential was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The account ran out of quota.
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// The account has a billing problem.
    #[error("billing issue: {0}")]
    Billing(String),

    /// Too many requests; the provider may recover later.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered but the payload was unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The provider kind cannot perform the requested operation.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Auth, quota, and billing errors will not fix themselves; operators
    /// should see them even though generation carries on.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Quota(_) | Self::Billing(_))
    }

    /// Short category label for log lines.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Quota(_) => "quota",
            Self::Billing(_) => "billing",
            Self::RateLimited(_) => "rate_limited",
            Self::Http { .. } => "http",
            Self::Network(_) => "network",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Maximum number of body characters carried into an error message.
const MAX_ERROR_BODY: usize = 300;

/// Map a non-success HTTP response to a [`ProviderError`].
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let message: String = body.chars().take(MAX_ERROR_BODY).collect();
    let lower = message.to_lowercase();

    match status.as_u16() {
        401 | 403 => ProviderError::Auth(message),
        402 => ProviderError::Billing(message),
        429 if lower.contains("quota") => ProviderError::Quota(message),
        429 => ProviderError::RateLimited(message),
        _ if lower.contains("billing") => ProviderError::Billing(message),
        _ if lower.contains("insufficient_quota") => ProviderError::Quota(message),
        code => ProviderError::Http {
            status: code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_auth_and_billing() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "bad key"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::PAYMENT_REQUIRED, ""),
            ProviderError::Billing(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "Your billing details are missing"),
            ProviderError::Billing(_)
        ));
    }

    #[test]
    fn classify_429_quota_vs_rate_limit() {
        let quota = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"code":"insufficient_quota","message":"You exceeded your current quota"}}"#,
        );
        assert!(matches!(quota, ProviderError::Quota(_)));
        assert!(quota.is_terminal());

        let rate = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(rate, ProviderError::RateLimited(_)));
        assert!(!rate.is_terminal());
    }

    #[test]
    fn classify_other_status_truncates_body() {
        let body = "x".repeat(1_000);
        match classify_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            ProviderError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message.len(), MAX_ERROR_BODY);
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }
}
