//! Build vendor-shaped request payloads from operation-agnostic input.

use crate::models::{is_reasoning_model, routes_system_prompt_as_user, strips_dimension_hints};
use crate::providers::AiError;
use crate::types::*;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// JSON object sent to the vendor. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct RequestPayload(Map<String, Value>);

impl RequestPayload {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn model(&self) -> Option<&str> {
        self.0.get("model").and_then(Value::as_str)
    }

    /// Copy of this payload with `key` set; used by transports for wire-only flags.
    pub fn with(&self, key: &str, value: Value) -> Self {
        let mut map = self.0.clone();
        map.insert(key.to_string(), value);
        Self(map)
    }
}

impl From<Map<String, Value>> for RequestPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Turns operation input into a payload for a given model.
pub trait PayloadBuilder {
    fn build_payload(
        &self,
        operation: OperationType,
        model_id: &str,
        input: &OperationInput,
        options: &RequestOptions,
    ) -> Result<RequestPayload, AiError>;
}

/// Dispatch on operation type. Operations without a payload shape fail with
/// `NotImplemented` before anything else happens.
pub fn build_payload(
    operation: OperationType,
    model_id: &str,
    input: &OperationInput,
    options: &RequestOptions,
) -> Result<RequestPayload, AiError> {
    match (operation, input) {
        (OperationType::Chat, OperationInput::Chat(chat)) => {
            Ok(build_chat_payload(model_id, chat, options))
        }
        (OperationType::Embeddings, OperationInput::Embeddings(emb)) => {
            Ok(build_embeddings_payload(model_id, emb, options))
        }
        (OperationType::Chat | OperationType::Embeddings, _) => Err(AiError::InvalidInput(format!(
            "input does not match operation type `{}`",
            operation
        ))),
        (other, _) => Err(AiError::NotImplemented(other)),
    }
}

pub fn build_chat_payload(model_id: &str, input: &ChatInput, options: &RequestOptions) -> RequestPayload {
    let mut messages = Vec::with_capacity(input.messages.len() + 1);
    if let Some(sys) = input.system_prompt.as_deref().filter(|s| !s.is_empty()) {
        // o1/o3 style models reject the system role.
        let role = if routes_system_prompt_as_user(model_id) {
            "user"
        } else {
            "system"
        };
        messages.push(json!({ "role": role, "content": sys }));
    }
    messages.extend(input.messages.iter().map(convert_message));

    // Configured options first; model and messages always win.
    let mut payload = options.base.clone();
    payload.insert("model".into(), json!(model_id));
    payload.insert("messages".into(), Value::Array(messages));

    if is_reasoning_model(model_id) {
        let effort = resolve_reasoning_effort(options);
        payload.insert("reasoning_effort".into(), json!(effort.as_str()));
    } else {
        payload.remove("reasoning_effort");
    }

    if !input.tools.is_empty() {
        payload.insert("tools".into(), Value::Array(convert_tools(&input.tools)));
    }

    if let Some(schema) = &input.structured_schema {
        payload.insert(
            "response_format".into(),
            json!({ "type": "json_schema", "json_schema": schema }),
        );
    }

    if options.stream {
        let stream_options = payload
            .entry("stream_options")
            .or_insert_with(|| json!({}));
        match stream_options.as_object_mut() {
            Some(obj) => {
                obj.insert("include_usage".into(), json!(true));
            }
            None => *stream_options = json!({ "include_usage": true }),
        }
    } else {
        // Stream flags from configured options would turn a plain call into SSE.
        payload.remove("stream");
        payload.remove("stream_options");
    }

    RequestPayload(payload)
}

pub fn build_embeddings_payload(
    model_id: &str,
    input: &EmbeddingsInput,
    options: &RequestOptions,
) -> RequestPayload {
    let mut payload = options.base.clone();
    payload.insert("model".into(), json!(model_id));
    payload.insert("input".into(), json!(input.prompt));
    payload.remove("reasoning_effort");
    payload.remove("stream");
    payload.remove("stream_options");
    if strips_dimension_hints(model_id) {
        payload.remove("dimensions");
    }
    RequestPayload(payload)
}

fn resolve_reasoning_effort(options: &RequestOptions) -> ReasoningEffort {
    if let Some(effort) = options.reasoning_effort {
        return effort;
    }
    match options.base.get("reasoning_effort") {
        Some(Value::String(s)) => ReasoningEffort::parse(s).unwrap_or_else(|| {
            tracing::warn!("Unknown reasoning_effort {:?}, using medium", s);
            ReasoningEffort::default()
        }),
        Some(other) => {
            tracing::warn!("Non-string reasoning_effort {}, using medium", other);
            ReasoningEffort::default()
        }
        None => ReasoningEffort::default(),
    }
}

fn convert_message(message: &ChatMessage) -> Value {
    let mut content = vec![json!({ "type": "text", "text": message.text })];
    for file in &message.attachments {
        if file.is_image() {
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": file.to_data_url() }
            }));
        } else if file.is_pdf() {
            content.push(json!({
                "type": "file",
                "file": {
                    "filename": file.filename,
                    "file_data": file.to_data_url()
                }
            }));
        } else {
            tracing::debug!("Skipping attachment {} ({})", file.filename, file.mime_type);
        }
    }

    let mut msg = json!({ "role": message.role, "content": content });
    if let Some(id) = &message.tool_call_id {
        msg["tool_call_id"] = json!(id);
    }
    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string()
                    }
                })
            })
            .collect();
        msg["tool_calls"] = Value::Array(calls);
    }
    msg
}

fn convert_tools(tools: &[ToolDef]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                    "strict": false
                }
            })
        })
        .collect()
}
