//! The platform "foundation" model collaborator (spec §1: "the
//! foundation-model service and proxy to other HTTP backends" — out of
//! core scope). Requests routed to `foundation` are forwarded verbatim
//! to a configured HTTP backend with no protocol translation; none of
//! `core::*` runs for this path.

use bytes::Bytes;
use futures::Stream;

use crate::error::GatewayError;

/// Thin reqwest-based proxy, grounded in the teacher's `openai.rs` HTTP
/// client usage (same `reqwest::Client`, same streamed-body pattern),
/// repurposed here for opaque passthrough instead of parsed SSE.
#[derive(Clone)]
pub struct FoundationClient {
    http: reqwest::Client,
    base_url: String,
}

impl FoundationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Forward the raw request body to the foundation model's own
    /// `/v1/chat/completions` endpoint and hand back its response body
    /// stream unmodified.
    pub async fn forward(
        &self,
        body: serde_json::Value,
    ) -> Result<impl Stream<Item = Result<Bytes, GatewayError>>, GatewayError> {
        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::GeneratorUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::GeneratorUnavailable(format!(
                "foundation model returned {}",
                response.status()
            )));
        }

        use futures::StreamExt;
        Ok(response
            .bytes_stream()
            .map(|r| r.map_err(|e| GatewayError::GeneratorUnavailable(e.to_string()))))
    }
}
