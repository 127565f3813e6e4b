//! Plan extraction from message tool-call parts.
//!
//! Extraction is total: any malformed payload degrades to defaults or
//! to "no plan", never to an error.

use log::{debug, warn};
use serde_json::Value;

use sift_protocol::plan::Plan;
use sift_protocol::tool_call::ToolCallRepr;

use crate::session::{ContentPart, Message};

/// Extract the canonical plan from a message.
///
/// Locates the first tool-call part whose name equals `tool_name`
/// (exact match). The payload is accepted either as a structured object
/// or as a JSON-encoded string. Returns `None` when no such part
/// exists or the payload cannot be interpreted at all.
pub fn extract_plan(message: &Message, tool_name: &str) -> Option<Plan> {
    let payload = message.parts.iter().find_map(|part| match part {
        ContentPart::ToolCall { name, payload } if name == tool_name => Some(payload),
        _ => None,
    });

    let Some(payload) = payload else {
        debug!("message {} carries no {} tool call", message.id, tool_name);
        return None;
    };

    let value = match payload {
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(value) => value,
            Err(e) => {
                warn!("unparsable {} payload, no plan: {}", tool_name, e);
                return None;
            }
        },
        other => other.clone(),
    };

    if !value.is_object() {
        warn!("{} payload is not an object, no plan", tool_name);
        return None;
    }

    Some(Plan::coerce(&value))
}

/// Decode a raw provider message part into a canonical tool-call
/// content part, if the part is a tool call at all.
pub fn tool_call_part(raw: &Value) -> Option<ContentPart> {
    let (name, payload) = ToolCallRepr::from_part(raw).canonical()?;
    Some(ContentPart::ToolCall { name, payload })
}
