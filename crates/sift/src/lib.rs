//! Session/event reconciliation engine.
//!
//! Merges two concurrently-running asynchronous streams - incremental
//! model output and framed automation-agent events - into one ordered,
//! persisted conversation timeline:
//!
//! - [`stream`] decodes the agent's chunked frame transport.
//! - [`plan`] extracts canonical plans from tool-call message parts.
//! - [`session`] owns the session collection and its durable storage.
//! - [`storage`] provides the keyed storage backends.
//! - [`reconcile`] runs the per-turn state machine and the persistence
//!   gate that commits timeline diffs exactly once per change.

pub mod config;
pub mod plan;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod stream;

pub use config::Config;
pub use reconcile::{
    AgentConnector, ModelProvider, PersistenceGate, PrimaryDelta, Reconciler, TransportError,
    TurnState,
};
pub use session::{ContentPart, Message, MessageRole, Session, SessionStore, StoreError};
pub use storage::{FsStore, KeyedStore, MemoryStore, StorageError};
pub use stream::{DecodeError, EventStream, FrameDecoder};
