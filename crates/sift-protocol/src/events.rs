//! Automation-agent event types.
//!
//! The agent reports progress as a sequence of framed events. Each frame
//! carries one JSON envelope `{type, data}`; the `type` tag selects the
//! payload shape carried in `data`.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Line prefix for a frame's payload line.
pub const FRAME_MARKER: &str = "data: ";

/// Frame delimiter: one blank line between frames.
pub const FRAME_DELIMITER: &str = "\n\n";

// ============================================================================
// Event envelope
// ============================================================================

/// One decoded agent event, tagged by `type` with the payload in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Screenshot of the page before the agent acts (base64 image bytes).
    InitialScreenshot(String),

    /// Narrative text output from the agent's model.
    Text(String),

    /// A browser action the agent is executing.
    ToolUse(ActionDescriptor),

    /// Synthesized run summary, emitted when the agent finishes.
    Summary(SummaryPayload),

    /// Final payload variant of the run summary.
    FinalPayload(SummaryPayload),

    /// The agent run failed.
    Error(AgentErrorPayload),
}

impl AgentEvent {
    /// Whether this event closes an agent run with a narrative that
    /// warrants a follow-up evaluation round.
    pub fn is_terminal_summary(&self) -> bool {
        matches!(self, Self::Summary(_) | Self::FinalPayload(_))
    }

    /// The summary payload, if this is a terminal summary event.
    pub fn summary(&self) -> Option<&SummaryPayload> {
        match self {
            Self::Summary(payload) | Self::FinalPayload(payload) => Some(payload),
            _ => None,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// A browser action descriptor from a `tool_use` event.
///
/// Only `action` is guaranteed; agents attach arbitrary per-action
/// fields (coordinates, text, selectors) which are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Action name, e.g. `left_click` or `type`.
    #[serde(default)]
    pub action: String,

    /// Remaining action-specific fields.
    #[serde(flatten)]
    pub params: serde_json::Map<String, Value>,
}

/// Payload of `summary` and `final_payload` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    /// Synthesized narrative of the actions performed.
    pub summary: String,

    /// Final screenshot (base64 image bytes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,

    /// Extended narrative, when the agent provides one.
    #[serde(
        default,
        rename = "fullNarrative",
        skip_serializing_if = "Option::is_none"
    )]
    pub full_narrative: Option<String>,
}

impl SummaryPayload {
    /// The richest narrative available: the full narrative when present,
    /// the short summary otherwise.
    pub fn narrative(&self) -> &str {
        self.full_narrative.as_deref().unwrap_or(&self.summary)
    }

    /// Decode the screenshot field into raw image bytes.
    pub fn screenshot_bytes(&self) -> Option<Vec<u8>> {
        let data = self.screenshot.as_deref()?;
        base64::engine::general_purpose::STANDARD.decode(data).ok()
    }
}

/// Payload of `error` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentErrorPayload {
    /// Human-readable failure description.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_event_wire_format() {
        let event: AgentEvent =
            serde_json::from_str(r#"{"type":"text","data":"hello"}"#).unwrap();
        assert_eq!(event, AgentEvent::Text("hello".to_string()));

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"data\":\"hello\""));
    }

    #[test]
    fn test_tool_use_preserves_extra_fields() {
        let raw = r#"{"type":"tool_use","data":{"action":"left_click","coordinate":[640,400]}}"#;
        let event: AgentEvent = serde_json::from_str(raw).unwrap();
        let AgentEvent::ToolUse(descriptor) = event else {
            panic!("expected tool_use");
        };
        assert_eq!(descriptor.action, "left_click");
        assert!(descriptor.params.contains_key("coordinate"));
    }

    #[test]
    fn test_summary_narrative_prefers_full() {
        let payload = SummaryPayload {
            summary: "short".to_string(),
            screenshot: None,
            full_narrative: Some("the long version".to_string()),
        };
        assert_eq!(payload.narrative(), "the long version");

        let payload = SummaryPayload {
            summary: "short".to_string(),
            screenshot: None,
            full_narrative: None,
        };
        assert_eq!(payload.narrative(), "short");
    }

    #[test]
    fn test_final_payload_roundtrip() {
        let raw = r#"{"type":"final_payload","data":{"summary":"done","screenshot":"aGk=","fullNarrative":"all steps done"}}"#;
        let event: AgentEvent = serde_json::from_str(raw).unwrap();
        assert!(event.is_terminal_summary());
        let payload = event.summary().unwrap();
        assert_eq!(payload.screenshot_bytes().unwrap(), b"hi");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"fullNarrative\":\"all steps done\""));
    }

    #[test]
    fn test_error_event() {
        let raw = r#"{"type":"error","data":{"message":"connection reset"}}"#;
        let event: AgentEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            AgentEvent::Error(AgentErrorPayload {
                message: "connection reset".to_string()
            })
        );
        assert!(!event.is_terminal_summary());
    }
}
