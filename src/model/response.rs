use serde::Serialize;

use super::{Delta, FinishReason, ToolCallWire, Usage};

/// Non-streaming response — spec §6.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: ChatCompletionMessage,
    pub finish_reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallWire>>,
}

impl ChatCompletion {
    pub fn new(
        id: String,
        created: i64,
        model: String,
        content: Option<String>,
        reasoning_content: Option<String>,
        tool_calls: Option<Vec<ToolCallWire>>,
        finish_reason: FinishReason,
        usage: Usage,
    ) -> Self {
        Self {
            id,
            object: "chat.completion",
            created,
            model,
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatCompletionMessage {
                    role: "assistant",
                    content,
                    reasoning_content,
                    tool_calls,
                },
                finish_reason: finish_reason.as_str(),
                logprobs: None,
            }],
            usage,
        }
    }
}

/// Streaming event — spec §6: `chat.completion.chunk` carrying one
/// `delta`, with `finish_reason`/`usage`/`timings` only present on the
/// terminal chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<super::Timings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunkChoice {
    pub index: u32,
    pub delta: Delta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<&'static str>,
}

impl ChatCompletionChunk {
    pub fn new(id: String, created: i64, model: String, delta: Delta) -> Self {
        Self {
            id,
            object: "chat.completion.chunk",
            created,
            model,
            choices: vec![ChatCompletionChunkChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
            usage: None,
            timings: None,
        }
    }

    pub fn finished(
        id: String,
        created: i64,
        model: String,
        finish_reason: FinishReason,
        usage: Usage,
        timings: super::Timings,
    ) -> Self {
        Self {
            id,
            object: "chat.completion.chunk",
            created,
            model,
            choices: vec![ChatCompletionChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(finish_reason.as_str()),
            }],
            usage: Some(usage),
            timings: Some(timings),
        }
    }

    /// Serialize as the `data: <json>\n\n` SSE wire line.
    pub fn to_sse_line(&self) -> String {
        format!("data: {}\n\n", serde_json::to_string(self).expect("serializable"))
    }
}

pub const DONE_LINE: &str = "data: [DONE]\n\n";
