use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Operation types & capabilities
// ---------------------------------------------------------------------------

/// Category of AI task; decides the payload shape and the catalog filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Chat,
    Embeddings,
    Moderation,
    TextToImage,
    TextToSpeech,
    SpeechToText,
}

impl OperationType {
    pub const ALL: [OperationType; 6] = [
        OperationType::Chat,
        OperationType::Embeddings,
        OperationType::Moderation,
        OperationType::TextToImage,
        OperationType::TextToSpeech,
        OperationType::SpeechToText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Chat => "chat",
            OperationType::Embeddings => "embeddings",
            OperationType::Moderation => "moderation",
            OperationType::TextToImage => "text_to_image",
            OperationType::TextToSpeech => "text_to_speech",
            OperationType::SpeechToText => "speech_to_text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature the caller wants the model to have. Only used to narrow the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ChatWithImageVision,
    ChatJsonOutput,
    ChatWithAudio,
    ChatWithVideo,
    ChatTools,
    ChatStructuredResponse,
}

impl Capability {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chat_with_image_vision" | "vision" => Some(Capability::ChatWithImageVision),
            "chat_json_output" | "json" => Some(Capability::ChatJsonOutput),
            "chat_with_audio" | "audio" => Some(Capability::ChatWithAudio),
            "chat_with_video" | "video" => Some(Capability::ChatWithVideo),
            "chat_tools" | "tools" => Some(Capability::ChatTools),
            "chat_structured_response" | "structured" => Some(Capability::ChatStructuredResponse),
            _ => None,
        }
    }
}

/// Requested capabilities. Sorted and deduplicated, so serializing it is canonical.
pub type CapabilitySet = BTreeSet<Capability>;

/// One entry of the vendor's model listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    #[serde(default)]
    pub owned_by: String,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owned_by: owned_by.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat input
// ---------------------------------------------------------------------------

/// A file attached to a chat message. Images become `image_url` blocks, PDFs `file` blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool parameters.
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatMessage {
    pub role: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// Set when this message carries a tool result.
    pub tool_call_id: Option<String>,
    /// Tool calls made earlier by the assistant, replayed as history.
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new("assistant", text)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new("tool", text)
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatInput {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDef>,
    /// `json_schema` block for structured output, e.g. `{"name": .., "schema": {..}}`.
    pub structured_schema: Option<serde_json::Value>,
}

impl ChatInput {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDef>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_structured_schema(mut self, schema: serde_json::Value) -> Self {
        self.structured_schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmbeddingsInput {
    pub prompt: String,
}

impl EmbeddingsInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Operation-agnostic input handed to the request builder.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationInput {
    Chat(ChatInput),
    Embeddings(EmbeddingsInput),
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    #[default]
    Medium,
    High,
}

impl ReasoningEffort {
    pub const ALL: [ReasoningEffort; 4] = [
        ReasoningEffort::Minimal,
        ReasoningEffort::Low,
        ReasoningEffort::Medium,
        ReasoningEffort::High,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == s)
    }
}

/// Per-call options. `base` holds the globally configured vendor fields
/// (temperature, dimensions, ...) merged into every payload.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub base: serde_json::Map<String, serde_json::Value>,
    pub stream: bool,
    pub reasoning_effort: Option<ReasoningEffort>,
}

impl RequestOptions {
    pub fn streamed() -> Self {
        Self {
            stream: true,
            ..Default::default()
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.base.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// Usage
// ---------------------------------------------------------------------------

/// Token counters as reported once per response (or cumulatively per chunk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub reasoning: u64,
    pub cached: u64,
}

/// Usage as seen on the wire; absent fields stay `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageSnapshot {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub total: Option<u64>,
    pub reasoning: Option<u64>,
    pub cached: Option<u64>,
}

impl UsageSnapshot {
    pub fn to_usage(self) -> TokenUsage {
        TokenUsage {
            input: self.input.unwrap_or(0),
            output: self.output.unwrap_or(0),
            total: self.total.unwrap_or(0),
            reasoning: self.reasoning.unwrap_or(0),
            cached: self.cached.unwrap_or(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport results
// ---------------------------------------------------------------------------

/// A materialized (non-streamed) chat completion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatCompletion {
    pub role: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageSnapshot>,
    pub raw: serde_json::Value,
}

/// Incremental tool-call fragment; fragments sharing an index belong to one call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolCallDelta {
    pub index: Option<usize>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// One unit of a streamed chat response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatMessageChunk {
    pub role: Option<String>,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
    pub usage: Option<UsageSnapshot>,
    pub raw: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputMessage {
    pub role: String,
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatOutput {
    pub message: OutputMessage,
    pub finish_reason: Option<String>,
    pub usage: TokenUsage,
    /// Vendor response body; `None` for streamed results.
    pub raw: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddingsOutput {
    pub vector: Vec<f32>,
    pub usage: TokenUsage,
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_type_round_trips_through_str() {
        for op in OperationType::ALL {
            assert_eq!(OperationType::parse(op.as_str()), Some(op));
        }
        assert_eq!(OperationType::parse("chat_completion"), None);
    }

    #[test]
    fn capability_set_serializes_in_canonical_order() {
        let a: CapabilitySet = [Capability::ChatJsonOutput, Capability::ChatWithImageVision]
            .into_iter()
            .collect();
        let b: CapabilitySet = [
            Capability::ChatWithImageVision,
            Capability::ChatJsonOutput,
            Capability::ChatJsonOutput,
        ]
        .into_iter()
        .collect();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn attachment_data_url() {
        let a = Attachment::new("x.png", "image/png", b"abc".to_vec());
        assert_eq!(a.to_data_url(), "data:image/png;base64,YWJj");
        assert!(a.is_image());
        assert!(!a.is_pdf());
    }

    #[test]
    fn usage_snapshot_defaults_absent_fields_to_zero() {
        let s = UsageSnapshot {
            input: Some(5),
            ..Default::default()
        };
        let u = s.to_usage();
        assert_eq!(u.input, 5);
        assert_eq!(u.output, 0);
        assert_eq!(u.reasoning, 0);
        assert_eq!(u.cached, 0);
    }

    #[test]
    fn reasoning_effort_defaults_to_medium() {
        assert_eq!(ReasoningEffort::default(), ReasoningEffort::Medium);
        assert_eq!(ReasoningEffort::parse("minimal"), Some(ReasoningEffort::Minimal));
        assert_eq!(ReasoningEffort::parse("extreme"), None);
    }
}
