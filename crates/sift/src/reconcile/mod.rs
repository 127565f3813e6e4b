//! Per-turn reconciliation of the primary and secondary streams.
//!
//! A turn appends the user message, opens the primary (model) stream
//! and, when the turn carries an automation instruction, the secondary
//! (agent) stream, then merges both into the in-memory timeline as
//! fragments arrive. Each stream owns one message; interleaving never
//! reorders parts within a message. When both streams have closed the
//! turn settles through the [`PersistenceGate`].

mod gate;
mod streams;

pub use gate::PersistenceGate;
pub use streams::{
    AgentByteStream, AgentConnector, ModelProvider, PrimaryDelta, PrimaryStream,
};

pub use crate::stream::TransportError;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use log::{debug, warn};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use sift_protocol::events::{AgentEvent, SummaryPayload};
use sift_protocol::plan::Plan;

use crate::config::Config;
use crate::plan::{extract_plan, tool_call_part};
use crate::session::{ContentPart, Message, MessageRole, SessionStore, StoreResult};
use crate::stream::{EventStream, StreamError};

/// Where the reconciler is within the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// No turn in flight.
    #[default]
    Idle,
    /// At least one stream is still open.
    AwaitingStreams,
    /// Both streams closed; committing through the persistence gate.
    Settling,
}

/// Drives one session's turns: stream merge, follow-up synthesis,
/// cancellation, and settle-time persistence.
pub struct Reconciler {
    store: Arc<SessionStore>,
    provider: Arc<dyn ModelProvider>,
    agent: Arc<dyn AgentConnector>,
    config: Config,
    gate: PersistenceGate,
    state: TurnState,
    loading: bool,
    timeline: Vec<Message>,
    last_plan: Option<Plan>,
    cancel: CancellationToken,
}

impl Reconciler {
    /// Create a reconciler over the given store and stream seams.
    pub fn new(
        store: Arc<SessionStore>,
        provider: Arc<dyn ModelProvider>,
        agent: Arc<dyn AgentConnector>,
        config: Config,
    ) -> Self {
        Self {
            gate: PersistenceGate::new(&config),
            store,
            provider,
            agent,
            config,
            state: TurnState::default(),
            loading: false,
            timeline: Vec::new(),
            last_plan: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a fresh session and make it the working session.
    pub async fn open_session(&mut self) -> String {
        let id = self.store.create_session().await;
        self.timeline.clear();
        self.last_plan = None;
        id
    }

    /// Switch to an existing session, loading its committed timeline.
    pub async fn attach_session(&mut self, id: &str) -> StoreResult<()> {
        self.store.select_session(id).await?;
        self.timeline = self
            .store
            .get(id)
            .await
            .map(|s| s.messages)
            .unwrap_or_default();
        self.last_plan = None;
        Ok(())
    }

    /// Current turn state.
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Whether a turn is still streaming.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The in-memory timeline, including uncommitted fragments.
    pub fn timeline(&self) -> &[Message] {
        &self.timeline
    }

    /// The plan extracted from the most recent primary round, if any.
    pub fn last_plan(&self) -> Option<&Plan> {
        self.last_plan.as_ref()
    }

    /// Token that aborts the current turn's primary stream when
    /// cancelled. The secondary stream always runs to completion.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The store this reconciler commits through.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Run one full turn to completion.
    ///
    /// Appends the user message, merges the primary stream and (when
    /// `agent_instruction` is given) the secondary stream, runs at most
    /// one follow-up primary round after a terminal summary, and
    /// settles. Returns whether the settle wrote to storage.
    pub async fn submit(
        &mut self,
        user_text: &str,
        agent_instruction: Option<&str>,
    ) -> StoreResult<bool> {
        let session_id = match self.store.current_session_id().await {
            Some(id) => id,
            None => self.open_session().await,
        };

        // A token spent by a previous turn's cancel is replaced.
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.state = TurnState::AwaitingStreams;
        self.loading = true;
        self.last_plan = None;
        self.timeline
            .push(Message::text(MessageRole::User, user_text));

        let mut primary = match self.provider.open(&self.timeline).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                self.append_stream_failure(&e);
                None
            }
        };
        let mut secondary = match agent_instruction {
            Some(instruction) => match self.agent.open(instruction).await {
                Ok(bytes) => Some(EventStream::new(bytes)),
                Err(e) => {
                    self.append_stream_failure(&e);
                    None
                }
            },
            None => None,
        };

        let cancel = self.cancel.clone();
        let mut primary_slot: Option<usize> = None;
        let mut agent_slot: Option<usize> = None;
        let mut terminal_summary: Option<SummaryPayload> = None;

        while primary.is_some() || secondary.is_some() {
            tokio::select! {
                _ = cancel.cancelled(), if primary.is_some() => {
                    debug!("primary stream aborted by user");
                    primary = None;
                }
                item = next_item(&mut primary), if primary.is_some() => match item {
                    Some(Ok(delta)) => self.apply_primary_delta(&mut primary_slot, delta),
                    Some(Err(e)) => {
                        self.append_stream_failure(&e);
                        primary = None;
                    }
                    None => {
                        self.finish_primary_round(primary_slot);
                        primary = None;
                    }
                },
                item = next_item(&mut secondary), if secondary.is_some() => match item {
                    Some(Ok(event)) => {
                        // Only a summary that closes the stream warrants
                        // an evaluation round; any later event unsets it.
                        terminal_summary = event.summary().cloned();
                        self.apply_agent_event(&mut agent_slot, event);
                    }
                    Some(Err(StreamError::Decode(e))) => {
                        warn!("dropping malformed agent frame: {}", e);
                    }
                    Some(Err(StreamError::Transport(e))) => {
                        self.append_stream_failure(&e);
                        secondary = None;
                    }
                    None => secondary = None,
                },
            }
        }

        // At most one evaluation round per turn, and never after a stop.
        if let Some(summary) = terminal_summary.take() {
            if self.cancel.is_cancelled() {
                debug!("skipping evaluation round after cancellation");
            } else {
                self.run_evaluation_round(&summary).await;
            }
        }

        self.state = TurnState::Settling;
        self.loading = false;
        let wrote = self
            .gate
            .settle(&self.store, &session_id, &self.timeline)
            .await?;
        self.state = TurnState::Idle;
        Ok(wrote)
    }

    /// Primary-only round asking the model to evaluate the agent's run.
    async fn run_evaluation_round(&mut self, summary: &SummaryPayload) {
        let prompt = format!(
            "The automation agent has finished. Review its report for safety \
             concerns or unresolved risks and give your evaluation.\n\n{}",
            summary.narrative()
        );
        self.timeline
            .push(Message::text(MessageRole::Assistant, prompt));

        let mut stream = match self.provider.open(&self.timeline).await {
            Ok(stream) => stream,
            Err(e) => {
                self.append_stream_failure(&e);
                return;
            }
        };

        let cancel = self.cancel.clone();
        let mut slot: Option<usize> = None;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("evaluation round aborted by user");
                    break;
                }
                item = stream.next() => match item {
                    Some(Ok(delta)) => self.apply_primary_delta(&mut slot, delta),
                    Some(Err(e)) => {
                        self.append_stream_failure(&e);
                        break;
                    }
                    None => {
                        self.finish_primary_round(slot);
                        break;
                    }
                },
            }
        }
    }

    /// Fold one primary fragment into the primary round's message.
    fn apply_primary_delta(&mut self, slot: &mut Option<usize>, delta: PrimaryDelta) {
        let idx = self.ensure_message(slot);
        match delta {
            PrimaryDelta::Text(fragment) => self.timeline[idx].push_text_delta(&fragment),
            PrimaryDelta::ToolPart(raw) => match tool_call_part(&raw) {
                Some(part) => self.timeline[idx].parts.push(part),
                None => debug!("dropping unrecognized tool part"),
            },
            PrimaryDelta::ToolResult { name, payload } => self.timeline[idx]
                .parts
                .push(ContentPart::ToolResult { name, payload }),
        }
    }

    /// Fold one agent event into the agent round's message.
    fn apply_agent_event(&mut self, slot: &mut Option<usize>, event: AgentEvent) {
        let idx = self.ensure_message(slot);
        let part = match event {
            AgentEvent::InitialScreenshot(data) => ContentPart::ToolResult {
                name: "initial_screenshot".to_string(),
                payload: json!({ "screenshot": data }),
            },
            AgentEvent::Text(text) => ContentPart::Text { text },
            AgentEvent::ToolUse(action) => ContentPart::ToolCall {
                name: action.action.clone(),
                payload: serde_json::to_value(&action).unwrap_or_default(),
            },
            AgentEvent::Summary(payload) => ContentPart::ToolResult {
                name: "summary".to_string(),
                payload: serde_json::to_value(&payload).unwrap_or_default(),
            },
            AgentEvent::FinalPayload(payload) => ContentPart::ToolResult {
                name: "final_payload".to_string(),
                payload: serde_json::to_value(&payload).unwrap_or_default(),
            },
            AgentEvent::Error(e) => ContentPart::Text {
                text: format!("Agent error: {}", e.message),
            },
        };
        self.timeline[idx].parts.push(part);
    }

    /// On primary closure, pull the plan out of the round's message.
    fn finish_primary_round(&mut self, slot: Option<usize>) {
        if let Some(idx) = slot {
            if let Some(plan) =
                extract_plan(&self.timeline[idx], &self.config.plan_tool_name)
            {
                debug!("extracted plan with {} steps", plan.todos.len());
                self.last_plan = Some(plan);
            }
        }
    }

    /// The message a stream round writes into, created on first fragment.
    fn ensure_message(&mut self, slot: &mut Option<usize>) -> usize {
        *slot.get_or_insert_with(|| {
            self.timeline.push(Message::new(MessageRole::Assistant));
            self.timeline.len() - 1
        })
    }

    /// Surface a transport failure in the timeline and stop the spinner.
    /// Fragments already received stay in place.
    fn append_stream_failure(&mut self, error: &TransportError) {
        warn!("stream failed: {}", error);
        self.timeline.push(Message::text(
            MessageRole::Assistant,
            format!("Sorry, something went wrong while streaming: {}.", error),
        ));
        self.loading = false;
    }
}

/// Next item of an optional stream; pends forever when absent so a
/// disabled branch never resolves.
async fn next_item<S>(stream: &mut Option<S>) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
