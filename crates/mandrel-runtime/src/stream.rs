//! Stream accumulator: assembles one LM response from a stream of events
//! (C6, §4.6).

use futures::StreamExt;
use mandrel_events::{EventBus, EventKind, SessionEvent};
use mandrel_llm::{LlmResponse, Message, StopReason, StreamEvent, Usage};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};

/// Delta buffer flushes to an `assistant_text_delta` event once it reaches
/// this many characters.
const DELTA_BATCH_SIZE: usize = 200;

#[derive(Default)]
struct OpenToolCall {
    id: String,
    name: String,
    args: String,
}

/// Consumes a provider's stream of [`StreamEvent`]s into one assembled
/// [`LlmResponse`], batching text deltas and merging split usage readings.
struct StreamAccumulator {
    text: String,
    reasoning: String,
    completed_tool_calls: Vec<mandrel_llm::ToolCall>,
    open_tool_call: Option<OpenToolCall>,
    pending_delta: String,
    usage: Usage,
    response_id: Option<String>,
    stop_reason: StopReason,
}

impl StreamAccumulator {
    fn new() -> Self {
        Self {
            text: String::new(),
            reasoning: String::new(),
            completed_tool_calls: Vec::new(),
            open_tool_call: None,
            pending_delta: String::new(),
            usage: Usage::default(),
            response_id: None,
            stop_reason: StopReason::EndTurn,
        }
    }

    async fn flush_pending_delta(&mut self, bus: &EventBus, session_id: Uuid) {
        if self.pending_delta.is_empty() {
            return;
        }
        let delta = std::mem::take(&mut self.pending_delta);
        let event = SessionEvent::new(EventKind::AssistantTextDelta, session_id)
            .with_data("delta", delta);
        bus.emit(event).await;
    }

    async fn handle(&mut self, event: StreamEvent, bus: &EventBus, session_id: Uuid) {
        match event {
            StreamEvent::StreamStart { usage } => {
                if let Some(u) = usage {
                    self.usage = self.usage.merge(u);
                }
            }
            StreamEvent::TextStart => {
                self.flush_pending_delta(bus, session_id).await;
            }
            StreamEvent::TextDelta(delta) => {
                self.text.push_str(&delta);
                self.pending_delta.push_str(&delta);
                if self.pending_delta.len() >= DELTA_BATCH_SIZE {
                    self.flush_pending_delta(bus, session_id).await;
                }
            }
            StreamEvent::TextEnd => {
                self.flush_pending_delta(bus, session_id).await;
            }
            StreamEvent::ReasoningStart => {
                self.flush_pending_delta(bus, session_id).await;
            }
            StreamEvent::ReasoningDelta(delta) => {
                self.reasoning.push_str(&delta);
            }
            StreamEvent::ReasoningEnd => {}
            StreamEvent::ToolCallStart { id, name } => {
                self.flush_pending_delta(bus, session_id).await;
                self.open_tool_call = Some(OpenToolCall {
                    id,
                    name,
                    args: String::new(),
                });
            }
            StreamEvent::ToolCallDelta { id, args_delta } => {
                if let Some(open) = &mut self.open_tool_call {
                    if open.id == id {
                        open.args.push_str(&args_delta);
                    }
                }
            }
            StreamEvent::ToolCallEnd { id } => {
                if let Some(open) = self.open_tool_call.take() {
                    if open.id == id {
                        let arguments = serde_json::from_str(&open.args)
                            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
                        self.completed_tool_calls
                            .push(mandrel_llm::ToolCall::new(open.id, open.name).with_arguments(arguments));
                    }
                }
            }
            StreamEvent::Finish {
                usage,
                response_id,
                stop_reason,
            } => {
                self.flush_pending_delta(bus, session_id).await;
                if let Some(u) = usage {
                    self.usage = self.usage.merge(u);
                }
                self.response_id = response_id;
                self.stop_reason = stop_reason;
            }
            StreamEvent::Error(_) | StreamEvent::ProviderEvent(_) => {
                self.flush_pending_delta(bus, session_id).await;
            }
        }
    }

    fn into_response(self) -> LlmResponse {
        let message = if self.completed_tool_calls.is_empty() {
            Message::assistant(self.text)
        } else {
            Message::assistant_with_tools(self.completed_tool_calls)
        };
        LlmResponse {
            has_tool_calls: message.tool_calls().is_some(),
            message,
            stop_reason: self.stop_reason,
            usage: self.usage,
            response_id: self.response_id,
        }
    }
}

/// Drive `stream` to completion, assembling one [`LlmResponse`] and emitting
/// batched `assistant_text_delta` events to `bus` along the way.
///
/// Cancelling `cancel` mid-stream flushes any pending delta and returns
/// [`RuntimeError::LmClient`] naming the cancellation. A [`StreamEvent::Error`]
/// is likewise flushed and wrapped.
pub async fn accumulate(
    mut stream: mandrel_llm::StreamBox,
    bus: &EventBus,
    session_id: Uuid,
    cancel: &CancellationToken,
) -> RuntimeResult<LlmResponse> {
    let mut accumulator = StreamAccumulator::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                accumulator.flush_pending_delta(bus, session_id).await;
                return Err(RuntimeError::LmClient("stream cancelled".to_string()));
            }
            next = stream.next() => {
                match next {
                    None => break,
                    Some(Ok(StreamEvent::Error(message))) => {
                        accumulator.flush_pending_delta(bus, session_id).await;
                        return Err(RuntimeError::LmClient(message));
                    }
                    Some(Ok(event)) => accumulator.handle(event, bus, session_id).await,
                    Some(Err(e)) => {
                        accumulator.flush_pending_delta(bus, session_id).await;
                        return Err(RuntimeError::LmClient(e.to_string()));
                    }
                }
            }
        }
    }

    accumulator.flush_pending_delta(bus, session_id).await;
    Ok(accumulator.into_response())
}
