//! A scripted [`LlmProvider`] for driving the conversation loop through a
//! fixed sequence of responses without a network call.
//!
//! Each call to [`LlmProvider::stream`] or [`LlmProvider::complete`] pops the
//! next [`ScriptedStep`] off the front of the queue. Popping a step of the
//! wrong shape (e.g. `stream()` called against a `Complete` step) panics —
//! that mismatch means the profile under test picked the wrong call mode,
//! which is itself a bug worth surfacing loudly rather than papering over.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use mandrel_llm::{
    LlmError, LlmProvider, LlmRequest, LlmResponse, LlmResult, Message, StopReason, StreamBox,
    StreamEvent, ToolCall, Usage,
};
use serde_json::Value;

/// One scripted reply to either `stream()` or `complete()`.
pub enum ScriptedStep {
    /// Served by `complete()`.
    Complete(LlmResponse),
    /// Served by `stream()`, replayed in order.
    Stream(Vec<StreamEvent>),
    /// Served by either call, always returned as an error.
    Error(String),
}

/// A queue-backed [`LlmProvider`] that replays pre-scripted steps.
///
/// Intended for exercising [`mandrel_runtime::process_input`]'s round loop
/// against the literal inputs/outcomes of the end-to-end scenarios without
/// a real model in the loop.
pub struct ScriptedProvider {
    name: String,
    model: String,
    max_context_length: usize,
    steps: Mutex<VecDeque<ScriptedStep>>,
    call_count: AtomicUsize,
}

impl ScriptedProvider {
    /// Build a provider that replays `steps` in order, one per call.
    #[must_use]
    pub fn new(model: impl Into<String>, steps: Vec<ScriptedStep>) -> Self {
        Self {
            name: "scripted".to_string(),
            model: model.into(),
            max_context_length: 200_000,
            steps: Mutex::new(steps.into_iter().collect()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Override the context window reported by [`LlmProvider::max_context_length`].
    #[must_use]
    pub fn with_max_context_length(mut self, max: usize) -> Self {
        self.max_context_length = max;
        self
    }

    /// Number of `stream`/`complete` calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> ScriptedStep {
        self.steps
            .lock()
            .expect("scripted provider mutex poisoned")
            .pop_front()
            .expect("scripted provider ran out of steps")
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(&self, _request: &LlmRequest) -> LlmResult<StreamBox> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            ScriptedStep::Stream(events) => {
                Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
            }
            ScriptedStep::Complete(_) => {
                panic!("scripted provider: stream() called but next step is Complete")
            }
            ScriptedStep::Error(message) => Err(LlmError::ApiRequestFailed(message)),
        }
    }

    async fn complete(&self, _request: &LlmRequest) -> LlmResult<LlmResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            ScriptedStep::Complete(response) => Ok(response),
            ScriptedStep::Stream(_) => {
                panic!("scripted provider: complete() called but next step is Stream")
            }
            ScriptedStep::Error(message) => Err(LlmError::ApiRequestFailed(message)),
        }
    }

    fn max_context_length(&self) -> usize {
        self.max_context_length
    }
}

/// A plain-text, no-tool-calls `Complete` step.
#[must_use]
pub fn text_response(text: impl Into<String>) -> LlmResponse {
    LlmResponse {
        message: Message::assistant(text),
        has_tool_calls: false,
        stop_reason: StopReason::EndTurn,
        usage: Usage::default(),
        response_id: None,
    }
}

/// A tool-calling `Complete` step. `calls` is `(id, name, arguments)`.
#[must_use]
pub fn tool_call_response(calls: Vec<(&str, &str, Value)>) -> LlmResponse {
    let tool_calls = calls
        .into_iter()
        .map(|(id, name, args)| ToolCall::new(id, name).with_arguments(args))
        .collect();
    LlmResponse {
        message: Message::assistant_with_tools(tool_calls),
        has_tool_calls: true,
        stop_reason: StopReason::ToolUse,
        usage: Usage::default(),
        response_id: None,
    }
}

/// A `Stream` step that replays `text` as a single delta, matching the
/// event order a real provider emits for a plain-text turn.
#[must_use]
pub fn text_stream(text: impl Into<String>) -> Vec<StreamEvent> {
    vec![
        StreamEvent::StreamStart { usage: None },
        StreamEvent::TextStart,
        StreamEvent::TextDelta(text.into()),
        StreamEvent::TextEnd,
        StreamEvent::Finish {
            usage: Some(Usage::default()),
            response_id: None,
            stop_reason: StopReason::EndTurn,
        },
    ]
}

/// A `Stream` step that replays a single tool call, fragmenting its
/// arguments across two `ToolCallDelta` events the way a real provider does.
#[must_use]
pub fn tool_call_stream(id: &str, name: &str, args: &Value) -> Vec<StreamEvent> {
    let encoded = args.to_string();
    let mid = encoded.len() / 2;
    let (head, tail) = encoded.split_at(mid);
    vec![
        StreamEvent::StreamStart { usage: None },
        StreamEvent::ToolCallStart {
            id: id.to_string(),
            name: name.to_string(),
        },
        StreamEvent::ToolCallDelta {
            id: id.to_string(),
            args_delta: head.to_string(),
        },
        StreamEvent::ToolCallDelta {
            id: id.to_string(),
            args_delta: tail.to_string(),
        },
        StreamEvent::ToolCallEnd { id: id.to_string() },
        StreamEvent::Finish {
            usage: Some(Usage::default()),
            response_id: None,
            stop_reason: StopReason::ToolUse,
        },
    ]
}
