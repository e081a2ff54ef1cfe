//! One-shot check run after setup: is the account on a tight request limit or out of quota?

use crate::auth::Endpoint;
use crate::models::defaults::DEFAULT_CHAT_MODEL;
use crate::providers::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use std::fmt;
use tracing::warn;

pub const PROBE_PROMPT: &str = "Answer with Hello";

/// Request limits at or below this are treated as the free tier.
pub const LOW_REQUEST_LIMIT: u64 = 200;

pub const TERMS_OF_USE_URL: &str =
    "https://developer.mittwald.de/docs/v2/platform/aihosting/access-and-usage/terms-of-use/";

const LIMIT_HEADERS: [&str; 2] = ["x-ratelimit-remaining-requests", "x-ratelimit-limit-requests"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeWarning {
    QuotaExceeded,
    LowRequestLimit { limit: u64 },
}

impl fmt::Display for ProbeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeWarning::QuotaExceeded => write!(
                f,
                "You have exceeded your mittwald AI usage quota. Almost every AI feature will be limited. See {}",
                TERMS_OF_USE_URL
            ),
            ProbeWarning::LowRequestLimit { limit } => write!(
                f,
                "Your mittwald AI request limit is {} requests. Almost every AI feature will be limited. See {}",
                limit, TERMS_OF_USE_URL
            ),
        }
    }
}

/// Decide from a probe response whether the host should be warned.
pub fn inspect(headers: &HeaderMap, body: &str) -> Option<ProbeWarning> {
    let quota_code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/code").and_then(Value::as_str).map(String::from));
    if quota_code.as_deref() == Some("insufficient_quota") {
        return Some(ProbeWarning::QuotaExceeded);
    }

    let limit = LIMIT_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    })?;
    (limit <= LOW_REQUEST_LIMIT).then_some(ProbeWarning::LowRequestLimit { limit })
}

#[async_trait]
pub trait RateLimitProbe: Send + Sync {
    async fn probe(
        &self,
        endpoint: &Endpoint,
        api_key: &str,
    ) -> Result<Option<ProbeWarning>, ProviderError>;
}

/// Sends one minimal chat completion. HTTP error statuses are inspected, not raised.
#[derive(Clone, Default)]
pub struct HttpRateLimitProbe {
    client: Client,
}

impl HttpRateLimitProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitProbe for HttpRateLimitProbe {
    async fn probe(
        &self,
        endpoint: &Endpoint,
        api_key: &str,
    ) -> Result<Option<ProbeWarning>, ProviderError> {
        let resp = self
            .client
            .post(endpoint.url("chat/completions"))
            .bearer_auth(api_key)
            .json(&json!({
                "model": DEFAULT_CHAT_MODEL,
                "messages": [{ "role": "user", "content": PROBE_PROMPT }],
            }))
            .send()
            .await?;
        let headers = resp.headers().clone();
        let body = resp.text().await.unwrap_or_default();
        Ok(inspect(&headers, &body))
    }
}

/// The host's user-facing message channel.
pub trait Notifier: Send + Sync {
    fn warn(&self, message: &str);
}

/// Sends warnings to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn warn(&self, message: &str) {
        warn!("{}", message);
    }
}
