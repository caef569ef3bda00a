//! The one route the gateway actually serves: `POST /v1/chat/completions`
//! (spec §6). Validates the request, resolves the model, builds the
//! per-request remapper/effective-params, then dispatches to either the
//! SSE streaming pipeline or the buffered non-streaming one.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use rand::Rng;

use crate::core::pipeline::{run_non_streaming, run_streaming, PipelineRequest};
use crate::core::remap::KeyRemapper;
use crate::error::GatewayError;
use crate::generator::{Generator, GeneratorRequest};
use crate::model::{ChatMessage, ChatRequest, Role};
use crate::registry::Backend;

use super::AppState;

pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    match handle(state, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: AppState, request: ChatRequest) -> Result<Response, GatewayError> {
    request.validate()?;

    let model_id = request.model.clone().unwrap_or_default();
    let backend = state.registry.resolve(&model_id)?;

    match backend {
        Backend::Foundation => forward_to_foundation(&state, &request).await,
        Backend::TensorRuntime(generator) => run_tensor_runtime(&state, request, generator.clone()).await,
    }
}

async fn forward_to_foundation(state: &AppState, request: &ChatRequest) -> Result<Response, GatewayError> {
    let client = state
        .foundation
        .as_ref()
        .ok_or_else(|| GatewayError::GeneratorUnavailable("foundation model is not configured".to_string()))?;

    let body = serde_json::to_value(request)?;
    let bytes = client.forward(body).await?;
    let content_type = if request.stream {
        "text/event-stream"
    } else {
        "application/json"
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from_stream(bytes))
        .expect("well-formed response"))
}

async fn run_tensor_runtime(
    state: &AppState,
    request: ChatRequest,
    generator: std::sync::Arc<dyn Generator>,
) -> Result<Response, GatewayError> {
    let server_defaults = state.config.server_defaults();
    let params = crate::core::params::resolve(&request, &server_defaults)?;
    let remapper = KeyRemapper::build(&request.tools, state.config.fix_tool_args);

    let prompt_text = flatten_prompt(&request.messages);
    let stop = request.stop.as_ref().map(|s| s.as_vec()).unwrap_or_default();

    let generator_request = GeneratorRequest {
        prompt: prompt_text.clone(),
        temperature: params.temperature,
        top_p: params.top_p,
        top_k: params.top_k,
        min_p: params.min_p,
        presence_penalty: params.presence_penalty,
        repetition_penalty: params.repetition_penalty,
        seed: params.seed,
        max_tokens: params.max_tokens,
        stop,
    };

    let tool_call_tags = generator.tool_call_tags();
    let chunk_stream = generator.generate(generator_request).await?;

    let id = generate_request_id();
    let created = chrono::Utc::now().timestamp();
    let model = request.model.clone().unwrap_or_else(model_id_fallback);
    let raw_output = state.config.raw_output;

    let pipeline_request = PipelineRequest {
        id,
        created,
        model,
        raw_output,
        effective_max_tokens: params.max_tokens,
        remapper,
        prompt_text,
        tool_call_tags,
    };

    if request.stream && state.config.streaming_enabled {
        let body_stream = run_streaming(pipeline_request, chunk_stream).map(|line| Ok::<_, std::io::Error>(line));
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .header("x-accel-buffering", "no")
            .body(Body::from_stream(body_stream))
            .expect("well-formed response"))
    } else {
        let completion = run_non_streaming(pipeline_request, chunk_stream).await?;
        Ok(Json(completion).into_response())
    }
}

fn model_id_fallback() -> String {
    "tensor-runtime".to_string()
}

fn generate_request_id() -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..24).map(|_| HEX[rng.gen_range(0..16)] as char).collect();
    format!("chatcmpl-{suffix}")
}

/// Flatten the conversation into a single prompt string for the
/// tensor-runtime generator, and as the basis for the token/usage
/// fallback estimate (spec §4.4). Out of core protocol-translation
/// scope, but the HTTP surface needs *some* way to turn `messages` into
/// the flat prompt the `Generator` trait expects.
fn flatten_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            let text = m.content.as_ref().map(|c| c.as_text()).unwrap_or_default();
            format!("{role}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
