//! OpenAI-compatible HTTP transport for the mittwald endpoint.
//! Payloads arrive fully built; this layer only sends them and decodes replies.

use super::sanitize;
use super::{ChunkStream, ProviderError, Transport};
use crate::request::RequestPayload;
use crate::types::{
    ChatCompletion, ChatMessageChunk, EmbeddingResponse, ModelDescriptor, ToolCall, ToolCallDelta,
    UsageSnapshot,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

/// Bearer-authenticated client for `{base_url}/models`, `/chat/completions`
/// and `/embeddings`.
pub struct CompatibleTransport {
    base_url: String,
    api_key: String,
    client: Client,
}

impl CompatibleTransport {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self::with_client(base_url, api_key, Client::new())
    }

    pub fn with_client(base_url: &str, api_key: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, payload: &RequestPayload) -> Result<Value, ProviderError> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(sanitize::api_error(status, &body, Some(&self.api_key)));
        }
        Ok(resp.json().await?)
    }
}

// ---- Response types (OpenAI wire format) ----

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

#[derive(Deserialize, Default)]
struct UsageResp {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
    prompt_tokens_details: Option<TokenDetails>,
    completion_tokens_details: Option<TokenDetails>,
}

#[derive(Deserialize, Default)]
struct TokenDetails {
    reasoning_tokens: Option<u64>,
    cached_tokens: Option<u64>,
}

impl UsageResp {
    fn snapshot(self) -> UsageSnapshot {
        let prompt = self.prompt_tokens_details.unwrap_or_default();
        let completion = self.completion_tokens_details.unwrap_or_default();
        UsageSnapshot {
            input: self.prompt_tokens,
            output: self.completion_tokens,
            total: self.total_tokens,
            reasoning: completion.reasoning_tokens,
            cached: prompt.cached_tokens.or(completion.cached_tokens),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<UsageResp>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResp,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    #[serde(default)]
    role: Option<String>,
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallResp>>,
}

#[derive(Deserialize)]
struct ToolCallResp {
    id: String,
    function: FunctionResp,
}

#[derive(Deserialize)]
struct FunctionResp {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageResp>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<DeltaContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct DeltaContent {
    role: Option<String>,
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDeltaResp>>,
}

#[derive(Deserialize)]
struct ToolCallDeltaResp {
    index: Option<usize>,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    usage: Option<UsageResp>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

fn decode_completion(raw: Value) -> Result<ChatCompletion, ProviderError> {
    let resp: ChatResponse = serde_json::from_value(raw.clone())?;
    let usage = resp.usage.map(UsageResp::snapshot);
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Other("Empty response".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                debug!(tool = %tc.function.name, error = %e, "tool call arguments are not JSON, using {{}}");
                json!({})
            });
            ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments,
            }
        })
        .collect();

    Ok(ChatCompletion {
        role: choice.message.role.unwrap_or_else(|| "assistant".into()),
        content: choice.message.content,
        tool_calls,
        finish_reason: choice.finish_reason,
        usage,
        raw,
    })
}

/// One SSE frame may carry several choices; only the first is used.
fn decode_chunk(chunk: StreamChunk) -> ChatMessageChunk {
    let usage = chunk.usage.map(UsageResp::snapshot);
    let Some(choice) = chunk.choices.and_then(|c| c.into_iter().next()) else {
        return ChatMessageChunk {
            usage,
            ..Default::default()
        };
    };
    let delta = choice.delta;
    let tool_calls = delta.as_ref().and_then(|d| d.tool_calls.as_ref()).map(|calls| {
        calls
            .iter()
            .map(|tc| ToolCallDelta {
                index: tc.index,
                id: tc.id.clone(),
                name: tc.function.as_ref().and_then(|f| f.name.clone()),
                arguments: tc.function.as_ref().and_then(|f| f.arguments.clone()),
            })
            .collect()
    });
    let (role, content) = match delta {
        Some(d) => (d.role, d.content),
        None => (None, None),
    };
    ChatMessageChunk {
        role,
        content,
        tool_calls,
        finish_reason: choice.finish_reason,
        usage,
    }
}

#[async_trait]
impl Transport for CompatibleTransport {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let resp = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(sanitize::api_error(status, &body, Some(&self.api_key)));
        }
        let models: ModelsResponse = resp.json().await?;
        Ok(models
            .data
            .into_iter()
            .map(|m| ModelDescriptor::new(m.id, m.owned_by.unwrap_or_default()))
            .collect())
    }

    async fn create_chat_completion(
        &self,
        payload: &RequestPayload,
    ) -> Result<ChatCompletion, ProviderError> {
        let raw = self.post_json("chat/completions", payload).await?;
        decode_completion(raw)
    }

    fn create_chat_completion_streamed(&self, payload: &RequestPayload) -> ChunkStream {
        let client = self.client.clone();
        let url = self.url("chat/completions");
        let api_key = self.api_key.clone();
        let body = payload.with("stream", json!(true));

        let s = async_stream::stream! {
            let resp = match client.post(&url).bearer_auth(&api_key).json(&body).send().await {
                Ok(r) => r,
                Err(e) => { yield Err(ProviderError::Network(e)); return; }
            };
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                yield Err(sanitize::api_error(status, &text, Some(&api_key)));
                return;
            }

            let mut events = resp.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(ev) => ev,
                    Err(e) => {
                        yield Err(ProviderError::Other(format!("Stream error: {}", e)));
                        return;
                    }
                };
                let data = event.data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    break;
                }
                let chunk: StreamChunk = match serde_json::from_str(data) {
                    Ok(c) => c,
                    Err(e) => {
                        debug!(error = %e, "skipping undecodable stream frame");
                        continue;
                    }
                };
                yield Ok(decode_chunk(chunk));
            }
        };
        Box::pin(s)
    }

    async fn create_embedding(
        &self,
        payload: &RequestPayload,
    ) -> Result<EmbeddingResponse, ProviderError> {
        let raw = self.post_json("embeddings", payload).await?;
        let resp: EmbeddingsResponse = serde_json::from_value(raw.clone())?;
        let embedding = resp
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::Other("Empty embeddings response".into()))?;
        Ok(EmbeddingResponse {
            embedding,
            usage: resp.usage.map(UsageResp::snapshot),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(v: Value) -> RequestPayload {
        match v {
            Value::Object(m) => RequestPayload::from(m),
            _ => RequestPayload::from(Map::new()),
        }
    }

    #[tokio::test]
    async fn lists_models_with_owner() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    { "id": "gpt-oss-120b", "owned_by": "mittwald" },
                    { "id": "internal" }
                ]
            })))
            .mount(&server)
            .await;

        let t = CompatibleTransport::new(&format!("{}/v1/", server.uri()), "sk-test");
        let models = t.list_models().await.unwrap();
        assert_eq!(models[0], ModelDescriptor::new("gpt-oss-120b", "mittwald"));
        assert_eq!(models[1].owned_by, "");
    }

    #[tokio::test]
    async fn chat_completion_decodes_usage_details() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({ "model": "gpt-oss-120b" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "lookup", "arguments": "{\"q\":\"x\"}" }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {
                    "prompt_tokens": 12,
                    "completion_tokens": 30,
                    "total_tokens": 42,
                    "completion_tokens_details": { "reasoning_tokens": 20 },
                    "prompt_tokens_details": { "cached_tokens": 4 }
                }
            })))
            .mount(&server)
            .await;

        let t = CompatibleTransport::new(&format!("{}/v1", server.uri()), "sk-test");
        let c = t
            .create_chat_completion(&payload(json!({ "model": "gpt-oss-120b", "messages": [] })))
            .await
            .unwrap();
        assert_eq!(c.content, None);
        assert_eq!(c.tool_calls[0].arguments, json!({ "q": "x" }));
        assert_eq!(c.finish_reason.as_deref(), Some("tool_calls"));
        let u = c.usage.unwrap();
        assert_eq!(u.reasoning, Some(20));
        assert_eq!(u.cached, Some(4));
        assert_eq!(c.raw["usage"]["total_tokens"], json!(42));
    }

    #[test]
    fn malformed_tool_arguments_decode_to_empty_object() {
        let c = decode_completion(json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "lookup", "arguments": "{\"q\":" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        assert_eq!(c.role, "assistant");
        assert_eq!(c.tool_calls[0].name, "lookup");
        assert_eq!(c.tool_calls[0].arguments, json!({}));
    }

    #[tokio::test]
    async fn http_errors_carry_reason_and_hide_the_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string("slow down, sk-test"),
            )
            .mount(&server)
            .await;

        let t = CompatibleTransport::new(&format!("{}/v1", server.uri()), "sk-test");
        let err = t
            .create_chat_completion(&payload(json!({ "model": "m" })))
            .await
            .unwrap_err();
        match err {
            ProviderError::Http { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "Too Many Requests: slow down, [REDACTED]");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn streamed_chat_decodes_frames_until_done() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: not-json\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2}}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let t = CompatibleTransport::new(&format!("{}/v1", server.uri()), "sk-test");
        let chunks: Vec<_> = t
            .create_chat_completion_streamed(&payload(json!({ "model": "m" })))
            .collect()
            .await;
        let chunks: Vec<ChatMessageChunk> = chunks.into_iter().map(Result::unwrap).collect();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].role.as_deref(), Some("assistant"));
        assert_eq!(chunks[1].content.as_deref(), Some("Hel"));
        assert_eq!(chunks[2].finish_reason.as_deref(), Some("stop"));
        assert_eq!(chunks[3].usage.unwrap().input, Some(5));
        assert_eq!(chunks[3].content, None);
    }

    #[tokio::test]
    async fn streamed_chat_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let t = CompatibleTransport::new(&format!("{}/v1", server.uri()), "sk-test");
        let mut s = t.create_chat_completion_streamed(&payload(json!({ "model": "m" })));
        let first = s.next().await.unwrap();
        assert!(matches!(first, Err(ProviderError::Http { status: 401, .. })));
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn embeddings_return_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "embedding": [0.5, -0.25], "index": 0 }],
                "usage": { "prompt_tokens": 3, "total_tokens": 3 }
            })))
            .mount(&server)
            .await;

        let t = CompatibleTransport::new(&format!("{}/v1", server.uri()), "sk-test");
        let e = t
            .create_embedding(&payload(json!({ "model": "Qwen3-Embedding-8B", "input": "hi" })))
            .await
            .unwrap();
        assert_eq!(e.embedding, vec![0.5, -0.25]);
        assert_eq!(e.usage.unwrap().total, Some(3));
    }
}
