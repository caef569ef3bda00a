use serde::{Deserialize, Serialize};

/// `ToolSchema` — spec §3: `name`, `parameters` JSON schema. The set of
/// declared property names under `parameters.properties` is the
/// authority consulted by `core::remap`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type", default = "default_tool_type")]
    pub kind: String,
    pub function: ToolFunctionSchema,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolFunctionSchema {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    /// Declared property names, in schema-declaration order (relies on
    /// `serde_json`'s `preserve_order` feature for the backing `Map`).
    pub fn declared_properties(&self) -> Vec<String> {
        self.function
            .parameters
            .get("properties")
            .and_then(|v| v.as_object())
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_properties_reads_schema_object_keys() {
        let schema: ToolSchema = serde_json::from_value(serde_json::json!({
            "type": "function",
            "function": {
                "name": "write",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "filePath": {"type": "string"},
                        "content": {"type": "string"},
                    }
                }
            }
        }))
        .unwrap();
        let props = schema.declared_properties();
        assert!(props.contains(&"filePath".to_string()));
        assert!(props.contains(&"content".to_string()));
    }
}
