//! Model catalog: the vendor listing, filtered per operation type and capability set.
//!
//! mittwald does not report what each model can do, so the rules below are
//! id-prefix allowlists. Results are cached per (operation, capabilities).

use crate::providers::{AiError, ProviderError, Transport};
use crate::types::{Capability, CapabilitySet, ModelDescriptor, OperationType};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owner tag of internal/dev-only entries in the listing.
const INTERNAL_OWNER: &str = "openai-dev";

const VISION_PREFIXES: &[&str] = &["mistral-small-"];
const JSON_OUTPUT_PREFIXES: &[&str] = &["gpt-oss-", "mistral-small-", "qwen3-coder-"];

/// Id prefixes (lower-case) accepted per operation type. Empty means nothing matches.
fn operation_prefixes(operation: OperationType) -> &'static [&'static str] {
    match operation {
        OperationType::Chat => &["gpt-oss", "mistral-small-", "qwen3-coder-"],
        OperationType::Embeddings => &["qwen3-embedding"],
        OperationType::Moderation => &["text-moderation", "omni-moderation"],
        OperationType::TextToImage | OperationType::TextToSpeech | OperationType::SpeechToText => {
            &[]
        }
    }
}

fn has_prefix(id: &str, prefixes: &[&str]) -> bool {
    let id = id.trim().to_ascii_lowercase();
    prefixes.iter().any(|p| id.starts_with(p))
}

/// Whether a listed model is valid for `operation` with every requested capability.
pub fn accepts(model: &ModelDescriptor, operation: OperationType, capabilities: &CapabilitySet) -> bool {
    if model.owned_by == INTERNAL_OWNER {
        return false;
    }
    if !has_prefix(&model.id, operation_prefixes(operation)) {
        return false;
    }
    capabilities.iter().all(|cap| match cap {
        Capability::ChatWithImageVision => has_prefix(&model.id, VISION_PREFIXES),
        Capability::ChatJsonOutput => has_prefix(&model.id, JSON_OUTPUT_PREFIXES),
        // Not supported yet.
        Capability::ChatWithAudio | Capability::ChatWithVideo => false,
        Capability::ChatTools | Capability::ChatStructuredResponse => true,
    })
}

/// `mittai_models_<operation>_<sha256(json(capabilities))>`; the set is sorted so the key is stable.
pub fn cache_key(operation: OperationType, capabilities: &CapabilitySet) -> String {
    let serialized = serde_json::to_string(capabilities).unwrap_or_default();
    let digest = Sha256::digest(serialized.as_bytes());
    format!("mittai_models_{}_{}", operation, URL_SAFE_NO_PAD.encode(digest))
}

/// Get/set-by-key store for resolved catalogs. Expiry is the store's business.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<String>>;
    async fn set(&self, key: &str, models: Vec<String>);
}

/// In-process cache store.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<String>> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, models: Vec<String>) {
        self.entries.write().await.insert(key.to_string(), models);
    }
}

/// Anything that can answer "which models fit this operation and these capabilities".
#[async_trait]
pub trait ModelCatalogSource: Send + Sync {
    async fn configured_models(
        &self,
        operation: OperationType,
        capabilities: &CapabilitySet,
    ) -> Result<Vec<String>, AiError>;
}

/// Resolves filtered catalogs against a transport, caching non-empty results.
#[derive(Clone)]
pub struct CatalogResolver {
    cache: Arc<dyn CacheStore>,
}

impl CatalogResolver {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Sorted, deduplicated model ids. Transport failures propagate unclassified.
    pub async fn resolve(
        &self,
        source: &dyn Transport,
        operation: OperationType,
        capabilities: &CapabilitySet,
    ) -> Result<Vec<String>, ProviderError> {
        let key = cache_key(operation, capabilities);
        if let Some(hit) = self.cache.get(&key).await.filter(|m| !m.is_empty()) {
            tracing::debug!("Model catalog cache hit for {}", key);
            return Ok(hit);
        }

        tracing::debug!("Model catalog cache miss for {}, listing models", key);
        let listing = source.list_models().await?;
        let models: Vec<String> = listing
            .into_iter()
            .filter(|m| accepts(m, operation, capabilities))
            .map(|m| m.id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        // Empty results are not cached so the next call lists again.
        if !models.is_empty() {
            self.cache.set(&key, models.clone()).await;
        }
        Ok(models)
    }
}
