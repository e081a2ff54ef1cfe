//! Classify transport errors into rate-limit / quota / other, by message text.
//!
//! Matching is case-sensitive substring search against the vendor's wording.
//! If the vendor rephrases these messages, classification silently degrades to
//! `Unclassified`; the tests below pin the exact markers.

use super::{AiError, ProviderError};

const RATE_LIMIT_MARKERS: [&str; 2] = ["Request too large", "Too Many Requests"];
const QUOTA_MARKERS: [&str; 1] = ["exceeded your current quota"];

/// Outcome of [`classify`].
#[derive(Debug)]
pub enum ErrorClassification {
    RateLimited { message: String },
    QuotaExceeded { message: String },
    /// Not one of ours; the original error, untouched.
    Unclassified(ProviderError),
}

pub fn classify(err: ProviderError) -> ErrorClassification {
    let message = err.to_string();
    if RATE_LIMIT_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorClassification::RateLimited { message }
    } else if QUOTA_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorClassification::QuotaExceeded { message }
    } else {
        ErrorClassification::Unclassified(err)
    }
}

impl From<ErrorClassification> for AiError {
    fn from(c: ErrorClassification) -> Self {
        match c {
            ErrorClassification::RateLimited { message } => AiError::RateLimited(message),
            ErrorClassification::QuotaExceeded { message } => AiError::QuotaExceeded(message),
            ErrorClassification::Unclassified(err) => AiError::Unclassified(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, body: &str) -> ProviderError {
        ProviderError::Http {
            status,
            body: body.into(),
        }
    }

    #[test]
    fn too_many_requests_is_rate_limited() {
        let c = classify(http(429, "Too Many Requests: slow down"));
        match c {
            ErrorClassification::RateLimited { message } => {
                assert_eq!(message, "HTTP error 429: Too Many Requests: slow down");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn request_too_large_is_rate_limited() {
        let c = classify(ProviderError::Other("Request too large for model".into()));
        assert!(matches!(c, ErrorClassification::RateLimited { .. }));
    }

    #[test]
    fn quota_marker_is_quota_exceeded() {
        let c = classify(http(
            429,
            "You exceeded your current quota, please check your plan",
        ));
        // The body also carries no rate-limit marker, so quota wins.
        assert!(matches!(c, ErrorClassification::QuotaExceeded { .. }));
    }

    #[test]
    fn rate_limit_marker_takes_precedence_over_quota() {
        let c = classify(ProviderError::Other(
            "Too Many Requests; you exceeded your current quota".into(),
        ));
        assert!(matches!(c, ErrorClassification::RateLimited { .. }));
    }

    #[test]
    fn anything_else_is_returned_verbatim() {
        let c = classify(http(500, "Internal Server Error: boom"));
        match c {
            ErrorClassification::Unclassified(ProviderError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "Internal Server Error: boom");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    // Wording drift: the markers are case-sensitive on purpose. If the vendor
    // lower-cases its messages these tests document that we stop classifying.
    #[test]
    fn lower_cased_vendor_wording_is_not_classified() {
        assert!(matches!(
            classify(ProviderError::Other("too many requests".into())),
            ErrorClassification::Unclassified(_)
        ));
        assert!(matches!(
            classify(ProviderError::Other("Exceeded Your Current Quota".into())),
            ErrorClassification::Unclassified(_)
        ));
    }

    #[test]
    fn classification_maps_onto_ai_error() {
        let e: AiError = classify(ProviderError::Other("exceeded your current quota".into())).into();
        assert!(matches!(e, AiError::QuotaExceeded(_)));
        assert_eq!(e.hint(), "add credits or upgrade the plan");
    }
}
