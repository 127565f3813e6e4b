//! Session data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID (`chat-<unix_ms>-<suffix>`).
    pub id: String,
    /// Human-readable session title.
    pub title: String,
    /// When the session was created.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// When the session was last updated.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    /// Ordered conversation timeline. Append-only after commit.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Session {
    /// Create an empty session with the given placeholder title.
    pub fn new(sentinel_title: &str) -> Self {
        let now = Utc::now();
        Self {
            id: generate_session_id(now),
            title: sentinel_title.to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }
}

fn generate_session_id(now: DateTime<Utc>) -> String {
    format!("chat-{}-{}", now.timestamp_millis(), nanoid::nanoid!(9))
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
    System,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(format!("unknown message role: {}", s)),
        }
    }
}

/// One message in the timeline.
///
/// A message is created when its stream emits the first fragment and is
/// extended in place until that stream closes; it is never mutated after
/// its owning stream settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID.
    pub id: String,
    /// Message author.
    pub role: MessageRole,
    /// Ordered content parts.
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

impl Message {
    /// Create an empty message for a stream that just opened.
    pub fn new(role: MessageRole) -> Self {
        Self {
            id: format!("msg-{}", nanoid::nanoid!(12)),
            role,
            parts: Vec::new(),
        }
    }

    /// Create a message holding a single text part.
    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        let mut message = Self::new(role);
        message.parts.push(ContentPart::Text { text: text.into() });
        message
    }

    /// Append a text fragment, extending the trailing text part when
    /// there is one so deltas accumulate into a single part.
    pub fn push_text_delta(&mut self, delta: &str) {
        if let Some(ContentPart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(ContentPart::Text {
                text: delta.to_string(),
            });
        }
    }

    /// All text parts flattened into one string.
    pub fn flattened_text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let ContentPart::Text { text } = part {
                if !out.is_empty() {
                    out.push_str("\n\n");
                }
                out.push_str(text);
            }
        }
        out
    }
}

/// One unit of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentPart {
    /// Plain text.
    Text { text: String },

    /// A tool call emitted by the model or agent.
    ToolCall {
        name: String,
        #[serde(default)]
        payload: Value,
    },

    /// The result of a tool call.
    ToolResult {
        name: String,
        #[serde(default)]
        payload: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_id_shape() {
        let session = Session::new("New Chat");
        assert!(session.id.starts_with("chat-"));
        assert_eq!(session.title, "New Chat");
        assert!(session.messages.is_empty());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn test_text_delta_accumulates_into_one_part() {
        let mut message = Message::new(MessageRole::Assistant);
        message.push_text_delta("Hel");
        message.push_text_delta("lo");
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.flattened_text(), "Hello");

        message.parts.push(ContentPart::ToolCall {
            name: "progressive_todos".to_string(),
            payload: json!({}),
        });
        message.push_text_delta(" world");
        assert_eq!(message.parts.len(), 3);
        assert_eq!(message.flattened_text(), "Hello\n\n world");
    }

    #[test]
    fn test_content_part_wire_tags() {
        let part = ContentPart::ToolResult {
            name: "screenshot".to_string(),
            payload: json!({"image": "aGk="}),
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"type\":\"toolResult\""));

        let part: ContentPart =
            serde_json::from_str(r#"{"type":"toolCall","name":"t","payload":{}}"#).unwrap();
        assert!(matches!(part, ContentPart::ToolCall { .. }));
    }

    #[test]
    fn test_timestamps_serialize_iso8601() {
        let session = Session::new("New Chat");
        let json = serde_json::to_value(&session).unwrap();
        let raw = json["createdAt"].as_str().unwrap();
        assert!(raw.contains('T'));

        let restored: Session = serde_json::from_value(json).unwrap();
        assert_eq!(restored.created_at, session.created_at);
    }

    #[test]
    fn test_role_parse_display() {
        for role in [MessageRole::User, MessageRole::Assistant, MessageRole::System] {
            let parsed: MessageRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("tool".parse::<MessageRole>().is_err());
    }
}
