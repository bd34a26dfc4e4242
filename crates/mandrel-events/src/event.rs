//! Session event vocabulary (§3, §4.1).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// What kind of thing happened during a conversation loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A session began processing.
    SessionStart,
    /// A session finished processing (idle or closed).
    SessionEnd,
    /// A user turn was appended to history.
    UserInput,
    /// The assistant started streaming text.
    AssistantTextStart,
    /// An assistant text delta arrived.
    AssistantTextDelta,
    /// The assistant finished streaming text.
    AssistantTextEnd,
    /// A tool call started executing.
    ToolCallStart,
    /// A tool call produced partial (untruncated) output.
    ToolCallOutputDelta,
    /// A tool call finished executing.
    ToolCallEnd,
    /// An operator injected steering guidance mid-loop.
    SteeringInjected,
    /// The configured turn limit was reached.
    TurnLimit,
    /// Loop detection fired on a repeated tool-call signature.
    LoopDetection,
    /// An unrecoverable error occurred.
    Error,
}

impl EventKind {
    /// Stable lowercase-snake-case name, used in logs and serialized events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::UserInput => "user_input",
            Self::AssistantTextStart => "assistant_text_start",
            Self::AssistantTextDelta => "assistant_text_delta",
            Self::AssistantTextEnd => "assistant_text_end",
            Self::ToolCallStart => "tool_call_start",
            Self::ToolCallOutputDelta => "tool_call_output_delta",
            Self::ToolCallEnd => "tool_call_end",
            Self::SteeringInjected => "steering_injected",
            Self::TurnLimit => "turn_limit",
            Self::LoopDetection => "loop_detection",
            Self::Error => "error",
        }
    }
}

/// A single event emitted by a session, delivered to every subscriber as a
/// value (copied per delivery attempt, never shared by reference).
#[derive(Debug, Clone)]
pub struct SessionEvent {
    /// What happened.
    pub kind: EventKind,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Which session emitted it.
    pub session_id: Uuid,
    /// Kind-specific payload (e.g. `tool_name`, `delta`, `exit_code`).
    pub data: HashMap<String, Value>,
}

impl SessionEvent {
    /// Build an event with an empty payload.
    #[must_use]
    pub fn new(kind: EventKind, session_id: Uuid) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            session_id,
            data: HashMap::new(),
        }
    }

    /// Attach a payload field, builder-style.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_as_str_matches_spec_vocabulary() {
        assert_eq!(EventKind::SessionStart.as_str(), "session_start");
        assert_eq!(EventKind::ToolCallOutputDelta.as_str(), "tool_call_output_delta");
        assert_eq!(EventKind::LoopDetection.as_str(), "loop_detection");
    }

    #[test]
    fn with_data_attaches_payload() {
        let event = SessionEvent::new(EventKind::ToolCallStart, Uuid::nil())
            .with_data("tool_name", "bash");
        assert_eq!(event.data.get("tool_name").unwrap(), "bash");
    }
}
