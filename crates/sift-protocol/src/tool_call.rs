//! Provider tool-call part representations.
//!
//! Different provider SDK generations tag the same logical tool call
//! differently: a wrapped `tool-invocation` object, a `tool-<name>`
//! discriminant with the payload inlined, or a `dynamic-tool` part
//! carrying the name as a field. All known shapes are decoded into one
//! closed union with an explicit fallback; nothing shape-sniffs beyond
//! the discriminant.

use serde_json::Value;

/// A recognized (or explicitly unrecognized) tool-call part shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallRepr {
    /// Wrapped form: `{type: "tool-invocation", toolInvocation: {toolName, args}}`.
    Invocation { name: String, args: Value },

    /// Inlined form: `{type: "tool-<name>", input}`.
    Named { name: String, input: Value },

    /// Dynamic form: `{type: "dynamic-tool", toolName, input}`.
    Dynamic { name: String, input: Value },

    /// Any part whose discriminant names no known tool-call shape.
    Unrecognized,
}

impl ToolCallRepr {
    /// Decode a raw message part by its `type` discriminant.
    pub fn from_part(part: &Value) -> Self {
        let discriminant = part.get("type").and_then(Value::as_str).unwrap_or("");

        match discriminant {
            "tool-invocation" => {
                let invocation = part.get("toolInvocation").cloned().unwrap_or(Value::Null);
                let name = invocation
                    .get("toolName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let args = invocation.get("args").cloned().unwrap_or(Value::Null);
                Self::Invocation { name, args }
            }
            "dynamic-tool" => {
                let name = part
                    .get("toolName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let input = part.get("input").cloned().unwrap_or(Value::Null);
                Self::Dynamic { name, input }
            }
            other => match other.strip_prefix("tool-") {
                Some(name) if !name.is_empty() => Self::Named {
                    name: name.to_string(),
                    input: part.get("input").cloned().unwrap_or(Value::Null),
                },
                _ => Self::Unrecognized,
            },
        }
    }

    /// The canonical `(tool name, payload)` pair, if this is a tool call.
    pub fn canonical(self) -> Option<(String, Value)> {
        match self {
            Self::Invocation { name, args } => Some((name, args)),
            Self::Named { name, input } => Some((name, input)),
            Self::Dynamic { name, input } => Some((name, input)),
            Self::Unrecognized => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invocation_shape() {
        let part = json!({
            "type": "tool-invocation",
            "toolInvocation": {
                "toolName": "progressive_todos",
                "args": {"todos": []}
            }
        });

        let repr = ToolCallRepr::from_part(&part);
        let (name, payload) = repr.canonical().unwrap();
        assert_eq!(name, "progressive_todos");
        assert_eq!(payload, json!({"todos": []}));
    }

    #[test]
    fn test_named_shape() {
        let part = json!({
            "type": "tool-progressive_todos",
            "input": {"enhanced_prompt": "x"}
        });

        let (name, payload) = ToolCallRepr::from_part(&part).canonical().unwrap();
        assert_eq!(name, "progressive_todos");
        assert_eq!(payload["enhanced_prompt"], "x");
    }

    #[test]
    fn test_dynamic_shape() {
        let part = json!({
            "type": "dynamic-tool",
            "toolName": "progressive_todos",
            "input": {}
        });

        let (name, _) = ToolCallRepr::from_part(&part).canonical().unwrap();
        assert_eq!(name, "progressive_todos");
    }

    #[test]
    fn test_unrecognized_shapes() {
        for part in [
            json!({"type": "text", "text": "hello"}),
            json!({"type": "tool-"}),
            json!({"type": "step-start"}),
            json!({}),
            json!(null),
        ] {
            assert_eq!(ToolCallRepr::from_part(&part), ToolCallRepr::Unrecognized);
        }
    }
}
