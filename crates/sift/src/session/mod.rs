//! Conversation sessions: models and the durable store.

mod models;
mod store;

pub use models::{ContentPart, Message, MessageRole, Session};
pub use store::{SessionGroups, SessionStore, StoreError, StoreResult};
