//! Session state: the canonical turn history, steering/follow-up queues,
//! and the event bus (C7, §4.7).

use std::collections::VecDeque;

use mandrel_events::{EventBus, EventKind, SessionEvent};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};
use crate::turn::Turn;

/// What a session is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next user input.
    Idle,
    /// Running the conversation loop.
    Processing,
    /// Processing paused, waiting on something external (reserved for
    /// future interactive tool approval).
    AwaitingInput,
    /// Terminated; no further input is accepted.
    Closed,
}

/// Tunables that shape one session's conversation loop.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Maximum tool-call rounds per user input before forcing an exit.
    pub max_tool_rounds_per_input: usize,
    /// Hard cap on total turns kept in history before fidelity reduction
    /// becomes mandatory regardless of mode.
    pub max_turns: usize,
    /// Fidelity reduction mode string (`""`, `"truncate"`, `"compact"`,
    /// `"summary:{low|medium|high}"`).
    pub fidelity_mode: String,
    /// Window size for tool-call loop detection.
    pub loop_detection_window: usize,
    /// Maximum subagent nesting depth permitted from this session.
    pub max_subagent_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tool_rounds_per_input: 50,
            max_turns: 200,
            fidelity_mode: String::new(),
            loop_detection_window: 3,
            max_subagent_depth: 1,
        }
    }
}

struct SessionInner {
    history: Vec<Turn>,
    state: SessionState,
    steering_queue: VecDeque<String>,
    followup_queue: VecDeque<String>,
}

/// One conversation: its id, configuration, mutable state, and event bus.
///
/// All mutable state lives behind a single mutex (§5) that is never held
/// across a language-model call or tool execution.
pub struct Session {
    /// Unique session identifier, also stamped onto every emitted event.
    pub id: Uuid,
    /// Session configuration.
    pub config: SessionConfig,
    inner: Mutex<SessionInner>,
    event_bus: EventBus,
}

impl Session {
    /// Create a new, idle session.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            inner: Mutex::new(SessionInner {
                history: Vec::new(),
                state: SessionState::Idle,
                steering_queue: VecDeque::new(),
                followup_queue: VecDeque::new(),
            }),
            event_bus: EventBus::new(),
        }
    }

    /// The session's event bus, for subscribing to its event stream.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Current turn count.
    pub async fn turn_count(&self) -> usize {
        self.inner.lock().await.history.len()
    }

    /// Snapshot of the current history.
    pub async fn history(&self) -> Vec<Turn> {
        self.inner.lock().await.history.clone()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Transition to a new lifecycle state.
    pub async fn set_state(&self, state: SessionState) {
        self.inner.lock().await.state = state;
    }

    /// Append a turn to history.
    pub async fn append_turn(&self, turn: Turn) {
        self.inner.lock().await.history.push(turn);
    }

    /// Queue operator guidance to be injected as a steering turn at the
    /// next opportunity. Rejected once the session is closed.
    pub async fn steer(&self, message: impl Into<String>) -> RuntimeResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Closed {
            return Err(RuntimeError::SessionClosed);
        }
        inner.steering_queue.push_back(message.into());
        Ok(())
    }

    /// Queue a follow-up user input to run immediately after the current
    /// one completes. Rejected once the session is closed.
    pub async fn follow_up(&self, message: impl Into<String>) -> RuntimeResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Closed {
            return Err(RuntimeError::SessionClosed);
        }
        inner.followup_queue.push_back(message.into());
        Ok(())
    }

    /// Drain every queued steering message, in FIFO order.
    pub async fn drain_steering(&self) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        inner.steering_queue.drain(..).collect()
    }

    /// Pop the next queued follow-up input, if any.
    pub async fn drain_one_followup(&self) -> Option<String> {
        self.inner.lock().await.followup_queue.pop_front()
    }

    /// Stamp and forward an event to every subscriber.
    pub async fn emit(&self, kind: EventKind, data: Vec<(&str, Value)>) {
        let mut event = SessionEvent::new(kind, self.id);
        for (key, value) in data {
            event = event.with_data(key, value);
        }
        self.event_bus.emit(event).await;
    }

    /// Close the session: mark it closed and shut down its event bus.
    /// Idempotent.
    pub async fn close(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Closed {
                return;
            }
            inner.state = SessionState::Closed;
        }
        self.event_bus.close().await;
    }
}
