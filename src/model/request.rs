use serde::{Deserialize, Serialize};

use super::ToolSchema;

/// `ChatRequest` — the OpenAI-compatible subset accepted at
/// `POST /v1/chat/completions` (spec §3, §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,

    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub min_p: Option<f32>,
    pub presence_penalty: Option<f32>,
    #[serde(alias = "frequency_penalty")]
    pub repetition_penalty: Option<f32>,
    pub seed: Option<i64>,
    #[serde(alias = "max_completion_tokens")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub logprobs: bool,
    pub top_logprobs: Option<u32>,

    #[serde(default)]
    pub tools: Vec<ToolSchema>,

    pub stop: Option<StopSequences>,
    pub response_format: Option<serde_json::Value>,
}

impl ChatRequest {
    /// spec §7: empty `messages` is a validation error.
    pub fn validate(&self) -> Result<(), crate::error::GatewayError> {
        if self.messages.is_empty() {
            return Err(crate::error::GatewayError::Validation(
                "messages must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallWire>>,
}

/// `content` is either a plain string or a list of structured parts
/// (OpenAI's multi-part message content). The gateway only needs the
/// text portions, so structured parts are flattened to their `text`
/// fields joined by newlines.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
}

/// `stop` is either a single string or an array of strings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

impl StopSequences {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            StopSequences::One(s) => vec![s.clone()],
            StopSequences::Many(v) => v.clone(),
        }
    }
}

/// Tool call attached to a request message (e.g. an `assistant` turn
/// replaying a prior tool call, or a `tool` turn's `tool_call_id`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCallWire {
    pub id: String,
    #[serde(rename = "type", default = "default_function_type")]
    pub kind: String,
    pub function: ToolCallFunctionWire,
}

fn default_function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCallFunctionWire {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_messages() {
        let req = ChatRequest {
            model: None,
            messages: vec![],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            min_p: None,
            presence_penalty: None,
            repetition_penalty: None,
            seed: None,
            max_tokens: None,
            logprobs: false,
            top_logprobs: None,
            tools: vec![],
            stop: None,
            response_format: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn stop_sequences_accepts_both_shapes() {
        let one: StopSequences = serde_json::from_str("\"STOP\"").unwrap();
        assert_eq!(one.as_vec(), vec!["STOP".to_string()]);
        let many: StopSequences = serde_json::from_str("[\"A\",\"B\"]").unwrap();
        assert_eq!(many.as_vec(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn message_content_parts_join_text_fields() {
        let content: MessageContent =
            serde_json::from_str(r#"[{"type":"text","text":"hello"},{"type":"text","text":"world"}]"#)
                .unwrap();
        assert_eq!(content.as_text(), "hello\nworld");
    }
}
