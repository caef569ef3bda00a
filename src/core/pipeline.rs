//! Request-scoped orchestration (spec §4.4, §4.5): ties the extractor,
//! transducer and remapper together for both the streaming and
//! non-streaming paths.

use std::time::Instant;

use async_stream::stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::error::GatewayError;
use crate::generator::ToolCallTags;
use crate::logging::{self, RequestSummary};
use crate::model::{
    ChatCompletion, ChatCompletionChunk, Delta, FinishReason, GeneratorChunk, Timings, ToolCallWire,
    Usage, VendorToolCall, DONE_LINE,
};

use super::extractor::Extractor;
use super::remap::KeyRemapper;
use super::sanitize::sanitize_tail;
use super::sse::PipelineEvent;
use super::transducer::{generate_tool_call_id, Transducer, TransducerEvent};

/// Everything the pipeline needs to know about one request that isn't
/// already captured by the generator stream itself.
pub struct PipelineRequest {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub raw_output: bool,
    pub effective_max_tokens: u32,
    pub remapper: KeyRemapper,
    /// Flattened prompt text, used only by the token/usage fallback
    /// estimate (spec §4.4) when the generator reports no authoritative
    /// counts.
    pub prompt_text: String,
    /// Generator-supplied tool-call sentinel tags (spec §2), read from
    /// `Generator::tool_call_tags()` before the stream was consumed.
    pub tool_call_tags: ToolCallTags,
}

struct Accumulator {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    any_tool_call_finalized: bool,
    prompt_text: String,
    completion_text: String,
}

impl Accumulator {
    fn new(prompt_text: String) -> Self {
        Self {
            prompt_tokens: None,
            completion_tokens: None,
            any_tool_call_finalized: false,
            prompt_text,
            completion_text: String::new(),
        }
    }

    fn note_chunk(&mut self, chunk: &GeneratorChunk) {
        if let Some(p) = chunk.prompt_tokens {
            self.prompt_tokens = Some(p);
        }
        if let Some(c) = chunk.completion_tokens {
            self.completion_tokens = Some(c);
        }
        self.completion_text.push_str(&chunk.text);
    }

    fn usage(&self) -> Usage {
        match (self.prompt_tokens, self.completion_tokens) {
            (Some(p), Some(c)) => Usage::new(p, c),
            _ => Usage::estimate(&self.prompt_text, &self.completion_text),
        }
    }

    fn finish_reason(&self, effective_max_tokens: u32) -> FinishReason {
        if self.any_tool_call_finalized {
            FinishReason::ToolCalls
        } else if self.completion_tokens.unwrap_or(0) >= effective_max_tokens {
            FinishReason::Length
        } else {
            FinishReason::Stop
        }
    }
}

/// Turn one `GeneratorChunk` into zero or more ordering-safe pipeline
/// events: vendor-parsed tool calls bypass the transducer entirely
/// (spec §4.2 "Vendor-provided tool calls"); otherwise the transducer
/// runs first (it takes priority over think-tag handling) and any
/// `PreText` it emits is routed through the extractor unless
/// `raw_output` is set (spec §6: raw-output suppresses think-tag
/// extraction).
fn process_chunk(
    chunk: &GeneratorChunk,
    extractor: &mut Extractor,
    transducer: &mut Transducer,
    remapper: &KeyRemapper,
    raw_output: bool,
    next_vendor_index: &mut usize,
) -> Vec<PipelineEvent> {
    let mut events = Vec::new();

    if let Some(vendor_calls) = &chunk.tool_calls {
        if !chunk.text.is_empty() {
            events.extend(emit_text(&chunk.text, extractor, raw_output));
        }
        for call in vendor_calls {
            events.extend(vendor_tool_call_events(call, next_vendor_index));
        }
        return events;
    }

    for event in transducer.push(&chunk.text, remapper) {
        events.extend(translate_transducer_event(event, extractor, raw_output));
    }

    events
}

/// Route one span of plain text through the extractor, unless
/// `raw_output` suppresses think-tag extraction (spec §6).
fn emit_text(text: &str, extractor: &mut Extractor, raw_output: bool) -> Vec<PipelineEvent> {
    if raw_output {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![PipelineEvent::Content(text.to_string())]
        }
    } else {
        let out = extractor.push(text);
        let mut events = Vec::new();
        if !out.content.is_empty() {
            events.push(PipelineEvent::Content(out.content));
        }
        if !out.reasoning.is_empty() {
            events.push(PipelineEvent::Reasoning(out.reasoning));
        }
        events
    }
}

fn translate_transducer_event(
    event: TransducerEvent,
    extractor: &mut Extractor,
    raw_output: bool,
) -> Vec<PipelineEvent> {
    match event {
        TransducerEvent::PreText(text) => emit_text(&text, extractor, raw_output),
        TransducerEvent::ToolOpen { index, id, name } => {
            vec![PipelineEvent::ToolOpen { index, id, name }]
        }
        TransducerEvent::ToolArgFragment { index, fragment } => {
            vec![PipelineEvent::ToolArgFragment { index, fragment }]
        }
        TransducerEvent::ToolClosed { index } => vec![PipelineEvent::ToolClosed { index }],
        TransducerEvent::ToolCallRecovered {
            index,
            id,
            name,
            arguments,
        } => vec![
            PipelineEvent::ToolOpen { index, id, name },
            PipelineEvent::ToolArgFragment {
                index,
                fragment: arguments,
            },
            PipelineEvent::ToolClosed { index },
        ],
    }
}

fn vendor_tool_call_events(call: &VendorToolCall, next_index: &mut usize) -> Vec<PipelineEvent> {
    let index = *next_index;
    *next_index += 1;
    let id = generate_tool_call_id();
    let arguments = serde_json::to_string(&call.arguments).unwrap_or_else(|_| "{}".to_string());
    vec![
        PipelineEvent::ToolOpen {
            index,
            id,
            name: call.name.clone(),
        },
        PipelineEvent::ToolArgFragment {
            index,
            fragment: arguments,
        },
        PipelineEvent::ToolClosed { index },
    ]
}

fn flush_tail(
    extractor: Extractor,
    transducer: &mut Transducer,
    remapper: &KeyRemapper,
    raw_output: bool,
) -> Vec<PipelineEvent> {
    let mut events = Vec::new();

    // `transducer.finish()` only ever produces tool-call events, never
    // `PreText`, so the scratch extractor passed here is never touched.
    for event in transducer.finish(remapper) {
        events.extend(translate_transducer_event(event, &mut Extractor::new(), raw_output));
    }

    if !raw_output {
        let out = extractor.finish();
        if !out.content.is_empty() {
            events.push(PipelineEvent::Content(out.content));
        }
        if !out.reasoning.is_empty() {
            events.push(PipelineEvent::Reasoning(out.reasoning));
        }
    }

    events
}

/// Streaming path (spec §4.4): returns the sequence of `data: ...\n\n`
/// SSE lines, terminating with `data: [DONE]\n\n` — even on mid-stream
/// error or cancellation.
pub fn run_streaming(
    req: PipelineRequest,
    mut generator: BoxStream<'static, Result<GeneratorChunk, GatewayError>>,
) -> impl Stream<Item = String> {
    stream! {
        let start = Instant::now();
        let PipelineRequest {
            id,
            created,
            model,
            raw_output,
            effective_max_tokens,
            remapper,
            prompt_text,
            tool_call_tags,
        } = req;

        yield ChatCompletionChunk::new(id.clone(), created, model.clone(), Delta::role_marker())
            .to_sse_line();

        let mut extractor = Extractor::new();
        let mut transducer = Transducer::new(tool_call_tags);
        let mut acc = Accumulator::new(prompt_text);
        let mut next_vendor_index = 0usize;
        let mut error: Option<GatewayError> = None;

        while let Some(next) = generator.next().await {
            match next {
                Ok(chunk) => {
                    acc.note_chunk(&chunk);
                    let events = process_chunk(
                        &chunk,
                        &mut extractor,
                        &mut transducer,
                        &remapper,
                        raw_output,
                        &mut next_vendor_index,
                    );
                    for event in events {
                        if matches!(event, PipelineEvent::ToolClosed { .. }) {
                            acc.any_tool_call_finalized = true;
                        }
                        if let Some(delta) = event.to_delta() {
                            yield ChatCompletionChunk::new(id.clone(), created, model.clone(), delta)
                                .to_sse_line();
                        }
                    }
                }
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }

        if error.is_none() {
            let tail_events = flush_tail(extractor, &mut transducer, &remapper, raw_output);
            for event in tail_events {
                if matches!(event, PipelineEvent::ToolClosed { .. }) {
                    acc.any_tool_call_finalized = true;
                }
                if let Some(delta) = event.to_delta() {
                    yield ChatCompletionChunk::new(id.clone(), created, model.clone(), delta).to_sse_line();
                }
            }
        }

        if let Some(err) = &error {
            yield ChatCompletionChunk::new(
                id.clone(),
                created,
                model.clone(),
                Delta::content(err.as_streaming_notice()),
            )
            .to_sse_line();
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let usage = acc.usage();
        let finish_reason = acc.finish_reason(effective_max_tokens);
        let timings = Timings {
            prompt_ms: 0,
            predicted_ms: elapsed_ms,
        };

        yield ChatCompletionChunk::finished(id, created, model.clone(), finish_reason, usage.clone(), timings)
            .to_sse_line();
        yield DONE_LINE.to_string();

        logging::log_request(&RequestSummary {
            model,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            elapsed_ms,
            error: error.as_ref().map(|e| e.to_string()),
        });
    }
}

/// Non-streaming path (spec §4.5): runs the generator to exhaustion,
/// then returns a single response object.
pub async fn run_non_streaming(
    req: PipelineRequest,
    mut generator: BoxStream<'static, Result<GeneratorChunk, GatewayError>>,
) -> Result<ChatCompletion, GatewayError> {
    let start = Instant::now();
    let PipelineRequest {
        id,
        created,
        model,
        raw_output,
        effective_max_tokens,
        remapper,
        prompt_text,
        tool_call_tags,
    } = req;

    let mut extractor = Extractor::new();
    let mut transducer = Transducer::new(tool_call_tags);
    let mut acc = Accumulator::new(prompt_text);
    let mut next_vendor_index = 0usize;
    let mut content = String::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<ToolCallWire> = Vec::new();
    let mut open_tool_names: std::collections::HashMap<usize, (String, String)> =
        std::collections::HashMap::new();
    let mut tool_args: std::collections::HashMap<usize, String> = std::collections::HashMap::new();

    while let Some(next) = generator.next().await {
        let chunk = next?;
        acc.note_chunk(&chunk);
        let events = process_chunk(
            &chunk,
            &mut extractor,
            &mut transducer,
            &remapper,
            raw_output,
            &mut next_vendor_index,
        );
        apply_non_streaming_events(
            events,
            &mut content,
            &mut reasoning,
            &mut open_tool_names,
            &mut tool_args,
            &mut acc,
        );
    }

    let tail_events = flush_tail(extractor, &mut transducer, &remapper, raw_output);
    apply_non_streaming_events(
        tail_events,
        &mut content,
        &mut reasoning,
        &mut open_tool_names,
        &mut tool_args,
        &mut acc,
    );

    for (index, (id, name)) in &open_tool_names {
        let arguments = tool_args.get(index).cloned().unwrap_or_else(|| "{}".to_string());
        tool_calls.push(ToolCallWire {
            id: id.clone(),
            kind: "function".to_string(),
            function: crate::model::ToolCallFunctionWire {
                name: Some(name.clone()),
                arguments: Some(arguments),
            },
        });
    }
    tool_calls.sort_by_key(|t| t.id.clone());

    let usage = acc.usage();
    let finish_reason = acc.finish_reason(effective_max_tokens);
    let elapsed_ms = start.elapsed().as_millis() as u64;

    logging::log_request(&RequestSummary {
        model: model.clone(),
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        elapsed_ms,
        error: None,
    });

    if !tool_calls.is_empty() {
        return Ok(ChatCompletion::new(
            id, created, model, None, None, Some(tool_calls), finish_reason, usage,
        ));
    }

    let sanitized_content = sanitize_tail(content.trim());
    let reasoning_opt = if reasoning.is_empty() {
        None
    } else {
        Some(reasoning.trim().to_string())
    };

    Ok(ChatCompletion::new(
        id,
        created,
        model,
        Some(sanitized_content),
        reasoning_opt,
        None,
        finish_reason,
        usage,
    ))
}

fn apply_non_streaming_events(
    events: Vec<PipelineEvent>,
    content: &mut String,
    reasoning: &mut String,
    open_tool_names: &mut std::collections::HashMap<usize, (String, String)>,
    tool_args: &mut std::collections::HashMap<usize, String>,
    acc: &mut Accumulator,
) {
    for event in events {
        match event {
            PipelineEvent::Content(text) => content.push_str(&text),
            PipelineEvent::Reasoning(text) => reasoning.push_str(&text),
            PipelineEvent::ToolOpen { index, id, name } => {
                open_tool_names.insert(index, (id, name));
                tool_args.entry(index).or_default();
            }
            PipelineEvent::ToolArgFragment { index, fragment } => {
                tool_args.entry(index).or_default().push_str(&fragment);
            }
            PipelineEvent::ToolClosed { .. } => {
                acc.any_tool_call_finalized = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{Generator, GeneratorRequest, MockGenerator};
    use crate::model::ToolSchema;

    fn remapper(tools: &[ToolSchema]) -> KeyRemapper {
        KeyRemapper::build(tools, false)
    }

    fn blank_request() -> GeneratorRequest {
        GeneratorRequest {
            prompt: String::new(),
            temperature: None,
            top_p: None,
            top_k: None,
            min_p: None,
            presence_penalty: None,
            repetition_penalty: None,
            seed: None,
            max_tokens: 4096,
            stop: vec![],
        }
    }

    #[tokio::test]
    async fn non_streaming_think_tag_split_across_pieces() {
        let gen = MockGenerator::from_text_pieces(["Hello <thi", "nk>secret</thi", "nk> world"]);
        let stream = gen.generate(blank_request()).await.unwrap();
        let req = PipelineRequest {
            id: "chatcmpl-1".into(),
            created: 0,
            model: "tensor-runtime".into(),
            raw_output: false,
            effective_max_tokens: 4096,
            remapper: remapper(&[]),
            prompt_text: String::new(),
            tool_call_tags: ToolCallTags::default(),
        };
        let response = run_non_streaming(req, stream).await.unwrap();
        let message = &response.choices[0].message;
        assert_eq!(message.content.as_deref(), Some("Hello  world"));
        assert_eq!(message.reasoning_content.as_deref(), Some("secret"));
        assert_eq!(response.choices[0].finish_reason, "stop");
    }

    #[tokio::test]
    async fn non_streaming_tool_call_scenario() {
        let tools = vec![serde_json::from_value::<ToolSchema>(serde_json::json!({
            "type": "function",
            "function": {
                "name": "write",
                "parameters": {"type": "object", "properties": {"filePath": {"type": "string"}}}
            }
        }))
        .unwrap()];
        let gen = MockGenerator::from_text_pieces([
            "<tool_call><function=write><parameter=file_path>\n/tmp/a\n</parameter></tool_call>",
        ]);
        let stream = gen.generate(blank_request()).await.unwrap();
        let req = PipelineRequest {
            id: "chatcmpl-2".into(),
            created: 0,
            model: "tensor-runtime".into(),
            raw_output: false,
            effective_max_tokens: 4096,
            remapper: remapper(&tools),
            prompt_text: String::new(),
            tool_call_tags: ToolCallTags::default(),
        };
        let response = run_non_streaming(req, stream).await.unwrap();
        assert_eq!(response.choices[0].finish_reason, "tool_calls");
        let tool_calls = response.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(
            tool_calls[0].function.arguments.as_deref(),
            Some("{\"filePath\":\"/tmp/a\"}")
        );
    }

    #[tokio::test]
    async fn streaming_emits_role_marker_then_done() {
        let gen = MockGenerator::from_text_pieces(["hi"]);
        let stream = gen.generate(blank_request()).await.unwrap();
        let req = PipelineRequest {
            id: "chatcmpl-3".into(),
            created: 0,
            model: "tensor-runtime".into(),
            raw_output: false,
            effective_max_tokens: 4096,
            remapper: remapper(&[]),
            prompt_text: String::new(),
            tool_call_tags: ToolCallTags::default(),
        };
        let lines: Vec<String> = run_streaming(req, stream).collect().await;
        assert!(lines.first().unwrap().contains("\"role\":\"assistant\""));
        assert_eq!(lines.last().unwrap(), DONE_LINE);
        assert!(lines[lines.len() - 2].contains("\"isFinished\"") || lines[lines.len() - 2].contains("finish_reason"));
    }
}
