//! Static provider data: default models, per-model settings, embedding sizes.

use super::{QWEN_EMBEDDING_8B, is_reasoning_model};
use crate::types::ReasoningEffort;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

pub const DEFAULT_CHAT_MODEL: &str = "Mistral-Small-3.2-24B-Instruct";
pub const DEFAULT_EMBEDDINGS_MODEL: &str = QWEN_EMBEDDING_8B;

/// Name of the settings field that holds the credential identifier.
pub const KEY_CONFIG_NAME: &str = "api_key";

/// What the host needs to pre-populate its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupData {
    pub key_config_name: String,
    /// Operation-type key (e.g. `chat_with_tools`) -> model id.
    pub default_models: BTreeMap<String, String>,
}

pub fn default_models() -> BTreeMap<String, String> {
    [
        ("chat", DEFAULT_CHAT_MODEL),
        ("chat_with_image_vision", DEFAULT_CHAT_MODEL),
        ("chat_with_complex_json", DEFAULT_CHAT_MODEL),
        ("chat_with_tools", DEFAULT_CHAT_MODEL),
        ("chat_with_structured_response", DEFAULT_CHAT_MODEL),
        ("embeddings", DEFAULT_EMBEDDINGS_MODEL),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn setup_data() -> SetupData {
    SetupData {
        key_config_name: KEY_CONFIG_NAME.to_string(),
        default_models: default_models(),
    }
}

/// Output vector length of known embedding models; 0 when unknown.
pub fn embeddings_vector_size(model_id: &str) -> usize {
    match model_id.to_ascii_lowercase().as_str() {
        "qwen3-embedding-8b" => 4096,
        _ => 0,
    }
}

/// Settings schema for a model, layered over the host's general settings.
pub fn model_settings(model_id: &str, general: Map<String, Value>) -> Map<String, Value> {
    let mut settings = general;

    if model_id == QWEN_EMBEDDING_8B {
        let dims = settings
            .entry("dimensions")
            .or_insert_with(|| json!({}));
        match dims.as_object_mut() {
            Some(obj) => {
                obj.insert("default".into(), json!(4096));
            }
            None => *dims = json!({ "default": 4096 }),
        }
    }

    if is_reasoning_model(model_id) {
        let options: Vec<&str> = ReasoningEffort::ALL.iter().map(|e| e.as_str()).collect();
        settings.insert(
            "reasoning_effort".into(),
            json!({
                "type": "select",
                "label": "Reasoning Effort",
                "description": "Constrains effort on reasoning for reasoning models.",
                "default": ReasoningEffort::default().as_str(),
                "constraints": { "options": options }
            }),
        );
    }

    settings
}
