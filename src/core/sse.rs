//! SSE emitter (spec §4.4): framing and ordering. The actual `data: ...`
//! line framing lives on `ChatCompletionChunk::to_sse_line` (model::response);
//! this module owns the event vocabulary that `pipeline` produces and
//! the pure mapping from one such event to a wire `Delta`.

use crate::model::{Delta, ToolCallDelta};

/// One unit of pipeline output, already ordering-safe: `pipeline` only
/// ever produces these in an order that satisfies spec §5's ordering
/// guarantee (content before the tool-call deltas that followed it in
/// the underlying text).
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Content(String),
    Reasoning(String),
    ToolOpen { index: usize, id: String, name: String },
    ToolArgFragment { index: usize, fragment: String },
    ToolClosed { index: usize },
}

impl PipelineEvent {
    /// `None` for `ToolClosed`: it carries no wire payload by itself,
    /// it just marks that the accumulator for `index` is complete.
    pub fn to_delta(&self) -> Option<Delta> {
        match self {
            PipelineEvent::Content(text) => Some(Delta::content(text.clone())),
            PipelineEvent::Reasoning(text) => Some(Delta::reasoning(text.clone())),
            PipelineEvent::ToolOpen { index, id, name } => {
                Some(Delta::tool_call(ToolCallDelta::open(*index, id.clone(), name.clone())))
            }
            PipelineEvent::ToolArgFragment { index, fragment } => Some(Delta::tool_call(
                ToolCallDelta::arguments_fragment(*index, fragment.clone()),
            )),
            PipelineEvent::ToolClosed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_and_reasoning_never_share_a_delta() {
        let content = PipelineEvent::Content("hi".into()).to_delta().unwrap();
        assert!(content.content.is_some());
        assert!(content.reasoning_content.is_none());

        let reasoning = PipelineEvent::Reasoning("thinking".into()).to_delta().unwrap();
        assert!(reasoning.reasoning_content.is_some());
        assert!(reasoning.content.is_none());
    }

    #[test]
    fn tool_closed_has_no_wire_payload() {
        assert!(PipelineEvent::ToolClosed { index: 0 }.to_delta().is_none());
    }
}
