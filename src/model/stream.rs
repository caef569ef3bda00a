use serde::Serialize;

/// `StreamChunk` (from generator) — spec §3. `text` may be empty and may
/// split or span a marker; `tool_calls`, when present, are vendor-parsed
/// and bypass text scanning entirely (spec §4.2 "Vendor-provided tool
/// calls").
#[derive(Debug, Clone, Default)]
pub struct GeneratorChunk {
    pub text: String,
    pub logprobs: Option<Vec<f32>>,
    pub tool_calls: Option<Vec<VendorToolCall>>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct VendorToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Reason generation finished — spec §3: exactly one of these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
}

impl FinishReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolCalls => "tool_calls",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Fallback estimate used when the generator doesn't report
    /// authoritative counts: character+word estimate grounded in the
    /// teacher's `TokenUsage` bookkeeping, generalized per spec §4.4.
    pub fn estimate(prompt_text: &str, completion_text: &str) -> Self {
        Self::new(estimate_tokens(prompt_text), estimate_tokens(completion_text))
    }
}

fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    let words = text.split_whitespace().count() as u32;
    let chars = text.chars().count() as u32;
    // Blend a word-based and char-based estimate (~4 chars/token); never
    // return zero for non-empty text.
    std::cmp::max(words, chars / 4).max(1)
}

#[derive(Debug, Clone, Serialize)]
pub struct Timings {
    pub prompt_ms: u64,
    pub predicted_ms: u64,
}

/// `DeltaChunk` (to client) — spec §3. At most one of `content` /
/// `reasoning_content`, plus optional `tool_calls` deltas. Serialized as
/// the `delta` object inside a `chat.completion.chunk` choice.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

impl Delta {
    pub fn role_marker() -> Self {
        Self {
            role: Some("assistant"),
            content: Some(String::new()),
            ..Default::default()
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning_content: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(delta: ToolCallDelta) -> Self {
        Self {
            tool_calls: Some(vec![delta]),
            ..Default::default()
        }
    }
}

/// Tool-call delta shape — spec §6: `{index, id?, type?, function:{name?,
/// arguments?}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    pub function: ToolCallFunctionDelta,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCallFunctionDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    pub fn open(index: usize, id: String, name: String) -> Self {
        Self {
            index,
            id: Some(id),
            kind: Some("function"),
            function: ToolCallFunctionDelta {
                name: Some(name),
                arguments: Some(String::new()),
            },
        }
    }

    pub fn arguments_fragment(index: usize, fragment: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            kind: None,
            function: ToolCallFunctionDelta {
                name: None,
                arguments: Some(fragment.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_estimate_never_zero_for_nonempty_text() {
        let u = Usage::estimate("hi", "there friend");
        assert!(u.prompt_tokens >= 1);
        assert!(u.completion_tokens >= 1);
    }

    #[test]
    fn usage_estimate_zero_for_empty_text() {
        let u = Usage::estimate("", "");
        assert_eq!(u.prompt_tokens, 0);
        assert_eq!(u.completion_tokens, 0);
    }

    #[test]
    fn finish_reason_as_str_matches_spec_values() {
        assert_eq!(FinishReason::Stop.as_str(), "stop");
        assert_eq!(FinishReason::Length.as_str(), "length");
        assert_eq!(FinishReason::ToolCalls.as_str(), "tool_calls");
    }
}
