//! Canonical plan payload schema.
//!
//! The model describes browser work as a `progressive_todos` tool call
//! whose payload is a plan: an enhanced prompt plus an ordered list of
//! todo steps. Payloads arrive loosely typed, so every field tolerates
//! absence and degrades to a typed default instead of failing the item.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool name carrying a plan payload.
pub const PLAN_TOOL_NAME: &str = "progressive_todos";

/// A normalized automation plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// The rewritten, fully-specified version of the user's request.
    #[serde(default)]
    pub enhanced_prompt: String,

    /// Ordered plan steps.
    #[serde(default)]
    pub todos: Vec<TodoItem>,
}

impl Plan {
    /// Coerce a loosely-typed payload into a plan.
    ///
    /// Field-level problems degrade to defaults; an item that is not an
    /// object at all becomes a fully-defaulted step whose id is its
    /// position, so the step count is never silently changed.
    pub fn coerce(value: &Value) -> Self {
        let enhanced_prompt = value
            .get("enhanced_prompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let todos = value
            .get("todos")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| TodoItem::coerce(index, item))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            enhanced_prompt,
            todos,
        }
    }
}

/// One normalized plan step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Step identifier (derived from position when absent).
    #[serde(default)]
    pub id: String,

    /// Human-readable step description.
    #[serde(default)]
    pub description: String,

    /// The tool action to perform, e.g. `left_click`.
    #[serde(default)]
    pub action: String,

    /// How the step is executed.
    #[serde(default)]
    pub details: ActionDetails,

    /// How completion is verified.
    #[serde(default)]
    pub validation: Validation,
}

impl TodoItem {
    /// Coerce one payload item, falling back to a positional id.
    pub fn coerce(index: usize, value: &Value) -> Self {
        let mut item: TodoItem =
            serde_json::from_value(value.clone()).unwrap_or_default();
        if item.id.is_empty() {
            item.id = index.to_string();
        }
        item
    }
}

/// Execution details of a plan step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDetails {
    /// Step kind.
    #[serde(default, rename = "type")]
    pub kind: ActionKind,

    /// CSS selector for the target element, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Input value for `type` steps, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Step timeout in milliseconds (0 when unspecified).
    #[serde(default)]
    pub timeout: u64,

    /// What the step should observe on success.
    #[serde(default)]
    pub expectation: String,
}

/// Validation rule for a plan step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    /// Selector to inspect after the step.
    #[serde(default)]
    pub selector: String,

    /// Expected state of the selected element.
    #[serde(default)]
    pub expected_state: String,
}

/// The closed set of step kinds, plus a fallback preserving unknown
/// strings so coercion never rejects a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Click,
    Type,
    Navigate,
    Extract,
    Wait,
    Scroll,
    Other(String),
}

impl Default for ActionKind {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for ActionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "click" => Self::Click,
            "type" => Self::Type,
            "navigate" => Self::Navigate,
            "extract" => Self::Extract,
            "wait" => Self::Wait,
            "scroll" => Self::Scroll,
            _ => Self::Other(s),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Click => "click".to_string(),
            ActionKind::Type => "type".to_string(),
            ActionKind::Navigate => "navigate".to_string(),
            ActionKind::Extract => "extract".to_string(),
            ActionKind::Wait => "wait".to_string(),
            ActionKind::Scroll => "scroll".to_string(),
            ActionKind::Other(s) => s,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::Type => write!(f, "type"),
            Self::Navigate => write!(f, "navigate"),
            Self::Extract => write!(f, "extract"),
            Self::Wait => write!(f, "wait"),
            Self::Scroll => write!(f, "scroll"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_full_payload() {
        let payload = json!({
            "enhanced_prompt": "Open example.com and check the login form",
            "todos": [{
                "id": "step-1",
                "description": "Navigate to the site",
                "action": "navigate",
                "details": {
                    "type": "navigate",
                    "value": "https://example.com",
                    "timeout": 5000,
                    "expectation": "page loads"
                },
                "validation": {
                    "selector": "body",
                    "expected_state": "visible"
                }
            }]
        });

        let plan = Plan::coerce(&payload);
        assert_eq!(plan.enhanced_prompt, "Open example.com and check the login form");
        assert_eq!(plan.todos.len(), 1);
        let todo = &plan.todos[0];
        assert_eq!(todo.id, "step-1");
        assert_eq!(todo.details.kind, ActionKind::Navigate);
        assert_eq!(todo.details.timeout, 5000);
        assert_eq!(todo.validation.expected_state, "visible");
    }

    #[test]
    fn test_coerce_defaults_missing_fields() {
        let payload = json!({
            "todos": [{ "description": "do something" }]
        });

        let plan = Plan::coerce(&payload);
        assert_eq!(plan.enhanced_prompt, "");
        let todo = &plan.todos[0];
        assert_eq!(todo.id, "0");
        assert_eq!(todo.action, "");
        assert_eq!(todo.details.timeout, 0);
        assert_eq!(todo.details.expectation, "");
        assert_eq!(todo.details.kind, ActionKind::default());
        assert_eq!(todo.validation.selector, "");
    }

    #[test]
    fn test_coerce_keeps_item_count_on_junk_items() {
        let payload = json!({
            "todos": ["not an object", 42, {"id": "real"}]
        });

        let plan = Plan::coerce(&payload);
        assert_eq!(plan.todos.len(), 3);
        assert_eq!(plan.todos[0].id, "0");
        assert_eq!(plan.todos[1].id, "1");
        assert_eq!(plan.todos[2].id, "real");
    }

    #[test]
    fn test_action_kind_roundtrip() {
        for raw in ["click", "type", "navigate", "extract", "wait", "scroll"] {
            let kind = ActionKind::from(raw.to_string());
            assert!(!matches!(kind, ActionKind::Other(_)));
            assert_eq!(String::from(kind), raw);
        }

        let kind = ActionKind::from("hover".to_string());
        assert_eq!(kind, ActionKind::Other("hover".to_string()));
        assert_eq!(String::from(kind), "hover");
    }
}
