//! Assemble a streamed chat response from its chunks.
//!
//! One aggregator per stream. Role and finish reason are first-non-empty-wins,
//! content and tool-call fragments are appended, and usage fields overwrite:
//! the vendor reports cumulative totals on each chunk, so adding them up would
//! double count.

use crate::providers::{AiError, ChunkStream};
use crate::types::{ChatMessageChunk, ChatOutput, OutputMessage, TokenUsage, ToolCall, ToolCallDelta};
use futures::stream::{Stream, StreamExt};
use serde_json::json;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No chunk seen yet.
    Open,
    Accumulating,
    /// A finish reason has been recorded. Late usage chunks are still applied.
    Finished,
}

/// A tool call while its fragments are still arriving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialToolCall {
    /// Vendor-assigned position; only used to match fragments, never as a vector offset.
    pub index: usize,
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Progressive view of a stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedChatResult {
    pub role: String,
    pub content: String,
    pub tool_calls: Vec<PartialToolCall>,
    pub finish_reason: Option<String>,
    pub usage: TokenUsage,
}

pub trait StreamAggregator {
    fn push(&mut self, chunk: &ChatMessageChunk);
    fn state(&self) -> StreamState;
    fn aggregated(&self) -> &AggregatedChatResult;
}

#[derive(Debug, Clone)]
pub struct ChatStreamAggregator {
    state: StreamState,
    result: AggregatedChatResult,
}

impl Default for ChatStreamAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStreamAggregator {
    pub fn new() -> Self {
        Self {
            state: StreamState::Open,
            result: AggregatedChatResult::default(),
        }
    }

    fn merge_tool_call(&mut self, delta: &ToolCallDelta) {
        let calls = &mut self.result.tool_calls;
        let existing = match delta.index {
            Some(i) => calls.iter().position(|c| c.index == i),
            // Unindexed fragment without an id continues the last call.
            None if delta.id.is_none() => calls.len().checked_sub(1),
            None => None,
        };
        let pos = match existing {
            Some(pos) => pos,
            None => {
                let index = delta.index.unwrap_or_else(|| {
                    calls.iter().map(|c| c.index.saturating_add(1)).max().unwrap_or(0)
                });
                calls.push(PartialToolCall {
                    index,
                    ..Default::default()
                });
                calls.len() - 1
            }
        };
        let call = &mut calls[pos];
        if let Some(id) = delta.id.as_deref().filter(|s| !s.is_empty()) {
            call.id = id.to_string();
        }
        if let Some(name) = delta.name.as_deref().filter(|s| !s.is_empty()) {
            if call.name.is_empty() {
                call.name = name.to_string();
            }
        }
        if let Some(args) = &delta.arguments {
            call.arguments.push_str(args);
        }
    }

    /// The output once a finish reason has arrived.
    pub fn finished_output(&self) -> Option<ChatOutput> {
        (self.state == StreamState::Finished).then(|| self.clone().into_output())
    }

    /// Materialize whatever has been accumulated.
    pub fn into_output(self) -> ChatOutput {
        let result = self.result;
        let tool_calls = result
            .tool_calls
            .into_iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| {
                let arguments = serde_json::from_str(&c.arguments).unwrap_or_else(|e| {
                    debug!(tool = %c.name, error = %e, "tool call arguments are not JSON, using {{}}");
                    json!({})
                });
                ToolCall {
                    id: c.id,
                    name: c.name,
                    arguments,
                }
            })
            .collect();
        let role = if result.role.is_empty() {
            "assistant".to_string()
        } else {
            result.role
        };
        ChatOutput {
            message: OutputMessage {
                role,
                text: result.content,
                tool_calls,
            },
            finish_reason: result.finish_reason,
            usage: result.usage,
            raw: None,
        }
    }
}

impl StreamAggregator for ChatStreamAggregator {
    fn push(&mut self, chunk: &ChatMessageChunk) {
        if self.state == StreamState::Open {
            self.state = StreamState::Accumulating;
        }

        if self.result.role.is_empty() {
            if let Some(role) = chunk.role.as_deref().filter(|r| !r.is_empty()) {
                self.result.role = role.to_string();
            }
        }

        if let Some(content) = &chunk.content {
            self.result.content.push_str(content);
        }

        if let Some(deltas) = &chunk.tool_calls {
            for delta in deltas {
                self.merge_tool_call(delta);
            }
        }

        if self.result.finish_reason.is_none() {
            if let Some(reason) = chunk.finish_reason.as_deref().filter(|r| !r.is_empty()) {
                self.result.finish_reason = Some(reason.to_string());
                self.state = StreamState::Finished;
            }
        }

        if let Some(u) = &chunk.usage {
            let usage = &mut self.result.usage;
            for (slot, value) in [
                (&mut usage.input, u.input),
                (&mut usage.output, u.output),
                (&mut usage.total, u.total),
                (&mut usage.reasoning, u.reasoning),
                (&mut usage.cached, u.cached),
            ] {
                if let Some(v) = value {
                    *slot = v;
                }
            }
        }
    }

    fn state(&self) -> StreamState {
        self.state
    }

    fn aggregated(&self) -> &AggregatedChatResult {
        &self.result
    }
}

/// A streamed chat call. Yields each chunk once, after folding it into the
/// aggregate. Not restartable: keep your own copy of chunks you need again.
pub struct StreamedChat {
    chunks: ChunkStream,
    aggregator: ChatStreamAggregator,
    done: bool,
}

impl StreamedChat {
    pub fn new(chunks: ChunkStream) -> Self {
        Self {
            chunks,
            aggregator: ChatStreamAggregator::new(),
            done: false,
        }
    }

    pub fn aggregated(&self) -> &AggregatedChatResult {
        self.aggregator.aggregated()
    }

    pub fn state(&self) -> StreamState {
        self.aggregator.state()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.aggregator.aggregated().finish_reason.as_deref()
    }

    /// Drain the remaining chunks and return the final output.
    pub async fn into_output(mut self) -> Result<ChatOutput, AiError> {
        while let Some(item) = self.next().await {
            item?;
        }
        Ok(self.aggregator.into_output())
    }
}

impl Stream for StreamedChat {
    type Item = Result<ChatMessageChunk, AiError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match ready!(this.chunks.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => {
                this.aggregator.push(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(err)) => {
                this.done = true;
                Poll::Ready(Some(Err(err.into())))
            }
            None => {
                this.done = true;
                Poll::Ready(None)
            }
        }
    }
}
