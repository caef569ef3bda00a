//! Argument-key remapper (spec §4.3): rewrites model-emitted parameter
//! keys to schema-declared keys using a prebuilt mapping plus an
//! optional heuristic fallback.

use std::collections::HashMap;

use crate::model::ToolSchema;

struct ToolKeyMap {
    /// snake_case(original) -> original, only entries where they differ.
    snake_to_original: HashMap<String, String>,
    /// Declared property names in schema-declaration order, used to
    /// break heuristic-match ties deterministically (spec §9 open
    /// question (b)).
    declared: Vec<String>,
}

pub struct KeyRemapper {
    per_tool: HashMap<String, ToolKeyMap>,
    fix_tool_args: bool,
}

impl KeyRemapper {
    /// Build once per request from the request's `tools[]` (spec §3
    /// "Lifecycle").
    pub fn build(tools: &[ToolSchema], fix_tool_args: bool) -> Self {
        let mut per_tool = HashMap::new();
        for tool in tools {
            let declared = tool.declared_properties();
            let mut snake_to_original = HashMap::new();
            for name in &declared {
                let snaked = to_snake_case(name);
                if &snaked != name {
                    snake_to_original.insert(snaked, name.clone());
                }
            }
            per_tool.insert(
                tool.name().to_string(),
                ToolKeyMap {
                    snake_to_original,
                    declared,
                },
            );
        }
        Self {
            per_tool,
            fix_tool_args,
        }
    }

    /// Remap a single key for the named tool. Unknown tools or keys with
    /// no mapping pass through verbatim.
    pub fn remap(&self, tool_name: &str, key: &str) -> String {
        let Some(map) = self.per_tool.get(tool_name) else {
            return key.to_string();
        };

        if let Some(original) = map.snake_to_original.get(key) {
            return original.clone();
        }

        if self.fix_tool_args {
            if let Some(found) = heuristic_match(key, &map.declared) {
                return found;
            }
        }

        key.to_string()
    }
}

/// Case-insensitive exact match, snake<->camel in either direction, then
/// suffix match — in that priority order, ties broken by the declared
/// property's position in schema order.
fn heuristic_match(key: &str, declared: &[String]) -> Option<String> {
    if let Some(found) = declared.iter().find(|d| d.eq_ignore_ascii_case(key)) {
        return Some(found.clone());
    }
    if let Some(found) = declared
        .iter()
        .find(|d| to_snake_case(d) == key || to_camel_case(key) == **d)
    {
        return Some(found.clone());
    }
    let key_lower = key.to_ascii_lowercase();
    if let Some(found) = declared.iter().find(|d| {
        let d_lower = d.to_ascii_lowercase();
        d_lower.ends_with(&key_lower) || key_lower.ends_with(&d_lower)
    }) {
        return Some(found.clone());
    }
    None
}

/// Insert `_` before each interior uppercase letter, lowercase all.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// Inverse-ish helper for the heuristic fallback: `snake_case` -> `camelCase`.
fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
            continue;
        }
        if capitalize_next {
            out.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolSchema;

    fn tool(name: &str, props: &[&str]) -> ToolSchema {
        let properties: serde_json::Map<String, serde_json::Value> = props
            .iter()
            .map(|p| (p.to_string(), serde_json::json!({"type": "string"})))
            .collect();
        serde_json::from_value(serde_json::json!({
            "type": "function",
            "function": {
                "name": name,
                "parameters": {"type": "object", "properties": properties}
            }
        }))
        .unwrap()
    }

    #[test]
    fn snake_case_remap_maps_file_path_to_file_path_schema_key() {
        let tools = vec![tool("write", &["filePath"])];
        let remapper = KeyRemapper::build(&tools, false);
        assert_eq!(remapper.remap("write", "file_path"), "filePath");
    }

    #[test]
    fn unmapped_key_passes_through() {
        let tools = vec![tool("write", &["filePath"])];
        let remapper = KeyRemapper::build(&tools, false);
        assert_eq!(remapper.remap("write", "content"), "content");
    }

    #[test]
    fn heuristic_fallback_only_when_enabled() {
        let tools = vec![tool("write", &["fileName"])];
        let off = KeyRemapper::build(&tools, false);
        assert_eq!(off.remap("write", "filename"), "filename");

        let on = KeyRemapper::build(&tools, true);
        assert_eq!(on.remap("write", "filename"), "fileName");
    }

    #[test]
    fn to_snake_case_examples() {
        assert_eq!(to_snake_case("filePath"), "file_path");
        assert_eq!(to_snake_case("URL"), "u_r_l");
        assert_eq!(to_snake_case("content"), "content");
    }
}
