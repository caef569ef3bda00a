//! Tool-call transducer (spec §4.2): detects `toolCallStartTag`/
//! `toolCallEndTag`-delimited regions and incrementally parses
//! `<function=NAME>` / `<parameter=KEY>VALUE</parameter>` markup into
//! JSON argument-fragment deltas.
//!
//! Tool-call detection takes priority over think-tag handling: this
//! module runs *before* `extractor` in the pipeline, diverting text into
//! a tool-call body buffer the moment a start tag appears.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::generator::ToolCallTags;

use super::remap::KeyRemapper;

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<function=([^>]+)>").unwrap())
}

fn param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<parameter=([^>]+)>([\s\S]*?)</parameter>").unwrap())
}

fn param_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<parameter=([^>]+)>([\s\S]*)$").unwrap())
}

/// Event emitted by the transducer for the pipeline to turn into wire
/// deltas. `PreText` is raw text that must flow back through the
/// extractor (it may itself contain `<think>` markers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransducerEvent {
    PreText(String),
    ToolOpen {
        index: usize,
        id: String,
        name: String,
    },
    ToolArgFragment {
        index: usize,
        fragment: String,
    },
    ToolClosed {
        index: usize,
    },
    /// Emitted only by the post-loop fallback (spec §4.2) when a whole
    /// tool call is recovered from accumulated text that defeated
    /// per-piece incremental detection.
    ToolCallRecovered {
        index: usize,
        id: String,
        name: String,
        arguments: String,
    },
}

struct ActiveCall {
    index: usize,
    id: String,
    name: Option<String>,
    emitted_keys: HashSet<String>,
    param_count: usize,
}

pub struct Transducer {
    in_tool_call: bool,
    current_tool_text: String,
    next_index: usize,
    current: Option<ActiveCall>,
    any_tool_call_detected: bool,
    raw_text_accum: String,
    tags: ToolCallTags,
}

impl Default for Transducer {
    fn default() -> Self {
        Self::new(ToolCallTags::default())
    }
}

impl Transducer {
    /// `tags` are generator-supplied (spec §2): the sentinel strings the
    /// active backend's model wraps tool calls in, not a gateway-wide
    /// constant.
    pub fn new(tags: ToolCallTags) -> Self {
        Self {
            in_tool_call: false,
            current_tool_text: String::new(),
            next_index: 0,
            current: None,
            any_tool_call_detected: false,
            raw_text_accum: String::new(),
            tags,
        }
    }

    pub fn is_in_tool_call(&self) -> bool {
        self.in_tool_call
    }

    pub fn any_tool_call_detected(&self) -> bool {
        self.any_tool_call_detected
    }

    pub fn push(&mut self, piece: &str, remapper: &KeyRemapper) -> Vec<TransducerEvent> {
        if !self.any_tool_call_detected {
            self.raw_text_accum.push_str(piece);
        }

        let mut events = Vec::new();
        let mut remaining = piece;

        loop {
            if self.in_tool_call {
                if let Some(idx) = remaining.find(self.tags.end.as_str()) {
                    self.current_tool_text.push_str(&remaining[..idx]);
                    remaining = &remaining[idx + self.tags.end.len()..];
                    events.extend(self.rescan(remapper));
                    events.extend(self.close_current());
                    self.in_tool_call = false;
                    continue;
                }
                self.current_tool_text.push_str(remaining);
                events.extend(self.rescan(remapper));
                break;
            } else if let Some(idx) = remaining.find(self.tags.start.as_str()) {
                if idx > 0 {
                    events.push(TransducerEvent::PreText(remaining[..idx].to_string()));
                }
                remaining = &remaining[idx + self.tags.start.len()..];
                self.in_tool_call = true;
                self.any_tool_call_detected = true;
                self.current_tool_text.clear();
                continue;
            } else {
                if !remaining.is_empty() {
                    events.push(TransducerEvent::PreText(remaining.to_string()));
                }
                break;
            }
        }

        events
    }

    fn rescan(&mut self, remapper: &KeyRemapper) -> Vec<TransducerEvent> {
        let mut events = Vec::new();

        if self.current.is_none() {
            let Some(caps) = function_re().captures(&self.current_tool_text) else {
                return events;
            };
            let name = caps[1].to_string();
            let index = self.next_index;
            self.next_index += 1;
            let id = generate_tool_call_id();
            self.current = Some(ActiveCall {
                index,
                id: id.clone(),
                name: Some(name.clone()),
                emitted_keys: HashSet::new(),
                param_count: 0,
            });
            events.push(TransducerEvent::ToolOpen { index, id, name });
        }

        let Some(call) = self.current.as_mut() else {
            return events;
        };
        let tool_name = call.name.clone().unwrap_or_default();

        for caps in param_re().captures_iter(&self.current_tool_text) {
            let key = caps[1].to_string();
            if call.emitted_keys.contains(&key) {
                continue;
            }
            let raw_value = caps[2].to_string();
            let value = strip_one_newline_each_end(&raw_value);
            if value.is_empty() {
                continue;
            }
            call.emitted_keys.insert(key.clone());
            let remapped = remapper.remap(&tool_name, &key);
            let json_value = serde_json::to_string(&value).unwrap_or_default();
            let fragment = if call.param_count == 0 {
                format!("{{\"{remapped}\":{json_value}")
            } else {
                format!(",\"{remapped}\":{json_value}")
            };
            call.param_count += 1;
            events.push(TransducerEvent::ToolArgFragment {
                index: call.index,
                fragment,
            });
        }

        events
    }

    fn close_current(&mut self) -> Vec<TransducerEvent> {
        let mut events = Vec::new();
        let Some(call) = self.current.take() else {
            return events;
        };
        let closing = if call.param_count > 0 { "}" } else { "{}" };
        events.push(TransducerEvent::ToolArgFragment {
            index: call.index,
            fragment: closing.to_string(),
        });
        events.push(TransducerEvent::ToolClosed { index: call.index });
        self.current_tool_text.clear();
        events
    }

    /// End-of-stream handling (spec §4.2 "End-of-stream salvage" and
    /// "Post-loop fallback").
    pub fn finish(&mut self, remapper: &KeyRemapper) -> Vec<TransducerEvent> {
        if self.in_tool_call {
            return self.salvage(remapper);
        }

        if !self.any_tool_call_detected {
            return self.post_loop_fallback(remapper);
        }

        Vec::new()
    }

    fn salvage(&mut self, remapper: &KeyRemapper) -> Vec<TransducerEvent> {
        let mut events = self.rescan(remapper);

        let last_closed_end = param_re()
            .find_iter(&self.current_tool_text)
            .last()
            .map(|m| m.end())
            .unwrap_or(0);
        let tail = self.current_tool_text[last_closed_end..].to_string();

        if let Some(caps) = param_open_re().captures(&tail) {
            if let Some(call) = self.current.as_mut() {
                let key = caps[1].to_string();
                if !call.emitted_keys.contains(&key) {
                    let raw_value = caps[2].to_string();
                    let value = strip_one_newline_each_end(&raw_value);
                    if !value.is_empty() {
                        call.emitted_keys.insert(key.clone());
                        let tool_name = call.name.clone().unwrap_or_default();
                        let remapped = remapper.remap(&tool_name, &key);
                        let json_value = serde_json::to_string(&value).unwrap_or_default();
                        let fragment = if call.param_count == 0 {
                            format!("{{\"{remapped}\":{json_value}")
                        } else {
                            format!(",\"{remapped}\":{json_value}")
                        };
                        call.param_count += 1;
                        events.push(TransducerEvent::ToolArgFragment {
                            index: call.index,
                            fragment,
                        });
                    }
                }
            }
        }

        events.extend(self.close_current());
        self.in_tool_call = false;
        events
    }

    /// Three trigger forms (spec §4.2): the XML `toolCallStartTag` markup
    /// that simply never got a matching end tag within one piece, a
    /// Mistral-style `[TOOL_CALLS][{...}, ...]` JSON array, or a bare
    /// `{"name": ..., "arguments": ...}` JSON object.
    fn post_loop_fallback(&mut self, remapper: &KeyRemapper) -> Vec<TransducerEvent> {
        let text = self.raw_text_accum.clone();
        let trimmed = text.trim_start();

        if text.contains(self.tags.start.as_str()) {
            return self.fallback_xml(&text, remapper);
        }
        if let Some(rest) = trimmed.strip_prefix("[TOOL_CALLS]") {
            return self.fallback_json(rest.trim_start(), remapper);
        }
        if trimmed.starts_with("{\"name\"") {
            return self.fallback_json(trimmed, remapper);
        }
        Vec::new()
    }

    fn fallback_xml(&mut self, text: &str, remapper: &KeyRemapper) -> Vec<TransducerEvent> {
        let Some(caps) = function_re().captures(text) else {
            return Vec::new();
        };
        let name = caps[1].to_string();
        let index = self.next_index;
        self.next_index += 1;
        let id = generate_tool_call_id();

        let mut emitted = HashSet::new();
        let mut arguments = String::from("{");
        let mut first = true;
        for caps in param_re().captures_iter(text) {
            let key = caps[1].to_string();
            if emitted.contains(&key) {
                continue;
            }
            let value = strip_one_newline_each_end(&caps[2]);
            if value.is_empty() {
                continue;
            }
            emitted.insert(key.clone());
            let remapped = remapper.remap(&name, &key);
            let json_value = serde_json::to_string(&value).unwrap_or_default();
            if !first {
                arguments.push(',');
            }
            arguments.push_str(&format!("\"{remapped}\":{json_value}"));
            first = false;
        }
        arguments.push('}');
        if first {
            arguments = "{}".to_string();
        }

        vec![TransducerEvent::ToolCallRecovered {
            index,
            id,
            name,
            arguments,
        }]
    }

    /// Parses either a single `{"name", "arguments"}` object or a
    /// `[{"name", "arguments"}, ...]` array of them, using
    /// `StreamDeserializer` so trailing non-JSON text (or a second call)
    /// doesn't fail the parse of the first value.
    fn fallback_json(&mut self, text: &str, remapper: &KeyRemapper) -> Vec<TransducerEvent> {
        let Some(value) = first_json_value(text) else {
            return Vec::new();
        };

        let calls: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![&value],
            _ => Vec::new(),
        };

        calls
            .into_iter()
            .filter_map(|call| self.recover_json_call(call, remapper))
            .collect()
    }

    fn recover_json_call(&mut self, call: &Value, remapper: &KeyRemapper) -> Option<TransducerEvent> {
        let name = call.get("name")?.as_str()?.to_string();
        let index = self.next_index;
        self.next_index += 1;
        let id = generate_tool_call_id();

        let arguments = match call.get("arguments") {
            Some(Value::Object(props)) => {
                let mut out = String::from("{");
                for (i, (key, val)) in props.iter().enumerate() {
                    let remapped = remapper.remap(&name, key);
                    let json_value = serde_json::to_string(val).unwrap_or_default();
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("\"{remapped}\":{json_value}"));
                }
                out.push('}');
                out
            }
            // Some backends emit `arguments` as an already-encoded JSON string.
            Some(Value::String(s)) => s.clone(),
            _ => "{}".to_string(),
        };

        Some(TransducerEvent::ToolCallRecovered {
            index,
            id,
            name,
            arguments,
        })
    }
}

/// The first complete JSON value in `text`, ignoring anything after it.
fn first_json_value(text: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()
        .and_then(|r| r.ok())
}

fn strip_one_newline_each_end(value: &str) -> String {
    let value = value.strip_prefix('\n').unwrap_or(value);
    value.strip_suffix('\n').unwrap_or(value).to_string()
}

/// `"call_" + 24 hex digits` (spec §3).
pub fn generate_tool_call_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let hex: String = (0..24)
        .map(|_| {
            let n: u8 = rng.gen_range(0..16);
            std::char::from_digit(n as u32, 16).unwrap()
        })
        .collect();
    format!("call_{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolSchema;

    fn remapper(tools: &[ToolSchema]) -> KeyRemapper {
        KeyRemapper::build(tools, false)
    }

    fn tool(name: &str, props: &[&str]) -> ToolSchema {
        let properties: serde_json::Map<String, serde_json::Value> = props
            .iter()
            .map(|p| (p.to_string(), serde_json::json!({"type": "string"})))
            .collect();
        serde_json::from_value(serde_json::json!({
            "type": "function",
            "function": {"name": name, "parameters": {"type": "object", "properties": properties}}
        }))
        .unwrap()
    }

    fn collect_args(events: &[TransducerEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                TransducerEvent::ToolArgFragment { fragment, .. } => Some(fragment.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn snake_case_remap_scenario() {
        let tools = vec![tool("write", &["filePath"])];
        let remapper = KeyRemapper::build(&tools, false);
        let mut t = Transducer::default();
        let mut events = t.push(
            "<tool_call><function=write><parameter=file_path>\n/tmp/a\n</parameter></tool_call>",
            &remapper,
        );
        events.extend(t.finish(&remapper));
        assert_eq!(collect_args(&events), "{\"filePath\":\"/tmp/a\"}");
        assert!(events
            .iter()
            .any(|e| matches!(e, TransducerEvent::ToolClosed { .. })));
    }

    #[test]
    fn empty_placeholder_dedup_scenario() {
        let tools = vec![tool("f", &["x"])];
        let remapper = remapper(&tools);
        let mut t = Transducer::default();
        let mut events = t.push(
            "<tool_call><function=f><parameter=x></parameter><parameter=x>v</parameter></tool_call>",
            &remapper,
        );
        events.extend(t.finish(&remapper));
        assert_eq!(collect_args(&events), "{\"x\":\"v\"}");
    }

    #[test]
    fn salvage_on_max_tokens_scenario() {
        let tools = vec![tool("f", &["k"])];
        let remapper = remapper(&tools);
        let mut t = Transducer::default();
        let mut events = t.push("<tool_call><function=f><parameter=k>abc", &remapper);
        events.extend(t.finish(&remapper));
        assert_eq!(collect_args(&events), "{\"k\":\"abc\"}");
    }

    #[test]
    fn text_before_start_tag_is_pretext() {
        let tools = vec![tool("f", &[])];
        let remapper = remapper(&tools);
        let mut t = Transducer::default();
        let events = t.push("hello <tool_call><function=f>", &remapper);
        assert_eq!(events[0], TransducerEvent::PreText("hello ".to_string()));
    }

    #[test]
    fn no_tool_call_text_is_all_pretext_and_nothing_recovered() {
        let tools = vec![tool("f", &[])];
        let remapper = remapper(&tools);
        let mut t = Transducer::default();
        let mut events = t.push("just plain text", &remapper);
        events.extend(t.finish(&remapper));
        assert_eq!(events, vec![TransducerEvent::PreText("just plain text".to_string())]);
    }

    #[test]
    fn mistral_tool_calls_marker_recovers_json_array() {
        let tools = vec![tool("write", &["filePath"])];
        let remapper = remapper(&tools);
        let mut t = Transducer::default();
        let mut events = t.push(
            "[TOOL_CALLS][{\"name\": \"write\", \"arguments\": {\"file_path\": \"/tmp/a\"}}]",
            &remapper,
        );
        events.extend(t.finish(&remapper));
        let recovered: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TransducerEvent::ToolCallRecovered { name, arguments, .. } => {
                    Some((name.clone(), arguments.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            recovered,
            vec![("write".to_string(), "{\"filePath\":\"/tmp/a\"}".to_string())]
        );
    }

    #[test]
    fn bare_json_object_recovers_single_call() {
        let tools = vec![tool("f", &["k"])];
        let remapper = remapper(&tools);
        let mut t = Transducer::default();
        let mut events = t.push("{\"name\": \"f\", \"arguments\": {\"k\": \"v\"}}", &remapper);
        events.extend(t.finish(&remapper));
        assert_eq!(events.len(), 1);
        match &events[0] {
            TransducerEvent::ToolCallRecovered { index, name, arguments, .. } => {
                assert_eq!(*index, 0);
                assert_eq!(name, "f");
                assert_eq!(arguments, "{\"k\":\"v\"}");
            }
            other => panic!("expected ToolCallRecovered, got {other:?}"),
        }
    }

    #[test]
    fn bare_json_object_with_encoded_arguments_string() {
        let tools = vec![tool("f", &["k"])];
        let remapper = remapper(&tools);
        let mut t = Transducer::default();
        let mut events = t.push("{\"name\": \"f\", \"arguments\": \"{\\\"k\\\":\\\"v\\\"}\"}", &remapper);
        events.extend(t.finish(&remapper));
        let arguments = events.iter().find_map(|e| match e {
            TransducerEvent::ToolCallRecovered { arguments, .. } => Some(arguments.clone()),
            _ => None,
        });
        assert_eq!(arguments, Some("{\"k\":\"v\"}".to_string()));
    }
}
