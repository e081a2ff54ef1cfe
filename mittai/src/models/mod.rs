pub mod catalog;
pub mod defaults;

pub use catalog::{CacheStore, CatalogResolver, MemoryCache, ModelCatalogSource, cache_key};
pub use defaults::{SetupData, default_models, embeddings_vector_size, model_settings, setup_data};

/// Embedding model that misbehaves when given explicit output dimensions.
pub const QWEN_EMBEDDING_8B: &str = "Qwen3-Embedding-8B";

/// Reasoning models expose a `reasoning_effort` control and report reasoning tokens.
pub fn is_reasoning_model(model_id: &str) -> bool {
    model_id.to_ascii_lowercase().starts_with("gpt-oss-")
}

/// o1/o3 style models do not accept a system role; the system prompt is sent as a user turn.
pub fn routes_system_prompt_as_user(model_id: &str) -> bool {
    let id = model_id.to_ascii_lowercase();
    id.contains("o1") || id.contains("o3")
}

pub fn strips_dimension_hints(model_id: &str) -> bool {
    model_id.eq_ignore_ascii_case(QWEN_EMBEDDING_8B)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_models_by_prefix() {
        assert!(is_reasoning_model("gpt-oss-120b"));
        assert!(is_reasoning_model("GPT-OSS-20B"));
        assert!(!is_reasoning_model("gpt-oss"));
        assert!(!is_reasoning_model("Mistral-Small-3.2-24B-Instruct"));
    }

    #[test]
    fn o_series_detection() {
        assert!(routes_system_prompt_as_user("o1-preview"));
        assert!(routes_system_prompt_as_user("O3-mini"));
        assert!(!routes_system_prompt_as_user("Mistral-Small-3.2-24B-Instruct"));
        assert!(!routes_system_prompt_as_user("gpt-oss-120b"));
    }

    #[test]
    fn dimension_hints_only_for_qwen_8b() {
        assert!(strips_dimension_hints("Qwen3-Embedding-8B"));
        assert!(strips_dimension_hints("qwen3-embedding-8b"));
        assert!(!strips_dimension_hints("Qwen3-Embedding-4B"));
    }
}
