//! Seams to the two external stream producers.
//!
//! The engine never talks to a provider SDK or an agent transport
//! directly; it consumes whatever implements these traits.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::session::Message;
use crate::stream::TransportError;

/// One fragment of the primary (model) stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryDelta {
    /// Incremental assistant text.
    Text(String),

    /// A raw provider-shaped tool-call message part. Decoded through
    /// the closed representation union; unrecognized parts are dropped.
    ToolPart(Value),

    /// A completed tool result.
    ToolResult { name: String, payload: Value },
}

/// The primary stream: incremental text/tool-call fragments for one turn.
pub type PrimaryStream = BoxStream<'static, Result<PrimaryDelta, TransportError>>;

/// The secondary stream's raw framed bytes for one agent run.
pub type AgentByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Token-generation provider, consumed as an opaque delta stream.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Open a completion stream over the timeline so far.
    async fn open(&self, messages: &[Message]) -> Result<PrimaryStream, TransportError>;
}

/// Remote automation agent, consumed as an opaque framed byte stream.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    /// Start an automation run for the given instruction.
    async fn open(&self, instruction: &str) -> Result<AgentByteStream, TransportError>;
}
