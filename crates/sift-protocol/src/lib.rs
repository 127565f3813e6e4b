//! Wire-format types shared between the reconciliation engine and its
//! external collaborators: the automation agent's event envelope, the
//! plan payload schema, and the provider tool-call representations.

pub mod events;
pub mod plan;
pub mod tool_call;

pub use events::{ActionDescriptor, AgentErrorPayload, AgentEvent, SummaryPayload};
pub use plan::{ActionDetails, ActionKind, Plan, TodoItem, Validation};
pub use tool_call::ToolCallRepr;
