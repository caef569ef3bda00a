//! `Generator` — stands in for the two out-of-core-scope collaborators
//! named in spec §1/§2: the platform foundation model and the
//! tensor-runtime model engine. Only the tensor-runtime-shaped generator
//! drives `core::pipeline`; `foundation` model requests are forwarded
//! with no protocol translation.

mod foundation;
mod mock;

pub use foundation::FoundationClient;
pub use mock::MockGenerator;

use futures::stream::BoxStream;

use crate::error::GatewayError;
use crate::model::GeneratorChunk;

/// Sentinel tag strings the transducer looks for (spec §2, §4.2).
#[derive(Debug, Clone)]
pub struct ToolCallTags {
    pub start: String,
    pub end: String,
}

impl Default for ToolCallTags {
    fn default() -> Self {
        Self {
            start: "<tool_call>".to_string(),
            end: "</tool_call>".to_string(),
        }
    }
}

/// A lazy, finite sequence of `GeneratorChunk`s (spec §2 item 1). The
/// tensor-runtime engine itself is out of scope; this trait is the seam
/// an actual engine binding would implement.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: GeneratorRequest,
    ) -> Result<BoxStream<'static, Result<GeneratorChunk, GatewayError>>, GatewayError>;

    /// Sentinel tag strings this backend's model wraps tool calls in
    /// (spec §2: generator-supplied data, not a gateway-wide constant —
    /// different tensor-runtime models use different markup).
    fn tool_call_tags(&self) -> ToolCallTags {
        ToolCallTags::default()
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub min_p: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub repetition_penalty: Option<f32>,
    pub seed: Option<i64>,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}
