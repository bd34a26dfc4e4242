//! The conversation loop: turns one user input into zero or more
//! model/tool rounds (C8, §4.8).

use futures::future::join_all;
use mandrel_events::EventKind;
use mandrel_llm::{LlmProvider, LlmRequest, ToolCall, ToolCallResult};
use mandrel_tools::{build_system_prompt, truncate_output, ExecutionEnvironment, TruncationOverrides};
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, RuntimeResult};
use crate::provider::ProviderProfile;
use crate::session::{Session, SessionState};
use crate::stream;
use crate::turn::{apply_fidelity, detect_loop, to_messages, Turn};

/// Run one user turn to completion: append it to history, loop over
/// model/tool rounds until the model stops requesting tools (or a limit or
/// cancellation intervenes), then drain exactly one queued follow-up
/// before returning.
pub async fn process_input(
    cancel: &CancellationToken,
    session: &Session,
    profile: &dyn ProviderProfile,
    env: &dyn ExecutionEnvironment,
    client: &dyn LlmProvider,
    user_input: &str,
) -> RuntimeResult<()> {
    session.set_state(SessionState::Processing).await;
    session.append_turn(Turn::user(user_input)).await;
    session
        .emit(EventKind::UserInput, vec![("text", user_input.into())])
        .await;

    let result = run_rounds(cancel, session, profile, env, client).await;

    match result {
        Ok(()) => {
            session.set_state(SessionState::Idle).await;
            session.emit(EventKind::SessionEnd, vec![]).await;

            if let Some(next) = session.drain_one_followup().await {
                return Box::pin(process_input(cancel, session, profile, env, client, &next)).await;
            }
            Ok(())
        }
        Err(err) => {
            session
                .emit(EventKind::Error, vec![("message", err.to_string().into())])
                .await;
            session.set_state(SessionState::Idle).await;
            session.emit(EventKind::SessionEnd, vec![]).await;
            Err(err)
        }
    }
}

async fn run_rounds(
    cancel: &CancellationToken,
    session: &Session,
    profile: &dyn ProviderProfile,
    env: &dyn ExecutionEnvironment,
    client: &dyn LlmProvider,
) -> RuntimeResult<()> {
    let mut round = 0;
    loop {
        if round >= session.config.max_tool_rounds_per_input {
            session.emit(EventKind::TurnLimit, vec![]).await;
            return Ok(());
        }
        round += 1;

        inject_steering(session).await;

        if cancel.is_cancelled() {
            // §5: a cancelled token during an LM call exits the loop
            // gracefully, with no `error` event.
            return Ok(());
        }

        if session.config.max_turns > 0 && session.turn_count().await >= session.config.max_turns {
            session.emit(EventKind::TurnLimit, vec![]).await;
            return Ok(());
        }

        let system_prompt = build_system_prompt(
            profile.base_prompt(),
            std::path::Path::new(&env.working_directory()),
            profile.tools(),
            profile.doc_filter(),
            Some(&session.config.model),
            None,
            None,
        )
        .await;

        let history = session.history().await;
        let reduced = apply_fidelity(&history, &session.config.fidelity_mode, profile.context_window_size());
        let mut messages = vec![mandrel_llm::Message::system(system_prompt)];
        messages.extend(to_messages(&reduced));

        let request = LlmRequest::new(
            if session.config.model.is_empty() {
                profile.default_model().to_string()
            } else {
                session.config.model.clone()
            },
            messages,
        )
        .with_tools(profile.tools().all_definitions())
        .with_provider_id(profile.id())
        .with_provider_options(profile.provider_options());

        let response = if profile.streaming() {
            let stream_box = match client.stream(&request).await {
                Ok(s) => s,
                Err(e) => return on_lm_error(cancel, e.to_string()),
            };
            match stream::accumulate(stream_box, session.event_bus(), session.id, cancel).await {
                Ok(r) => r,
                Err(e) => return on_lm_error(cancel, e.to_string()),
            }
        } else {
            match client.complete(&request).await {
                Ok(r) => r,
                Err(e) => return on_lm_error(cancel, e.to_string()),
            }
        };

        let tool_calls = response.message.tool_calls().unwrap_or(&[]).to_vec();
        let text = response.message.text().unwrap_or("").to_string();

        session
            .append_turn(Turn::Assistant {
                content: text,
                tool_calls: tool_calls.clone(),
                reasoning: None,
                usage: response.usage,
                response_id: response.response_id.clone(),
                created_at: chrono::Utc::now(),
            })
            .await;
        session.emit(EventKind::AssistantTextEnd, vec![]).await;

        if tool_calls.is_empty() {
            return Ok(());
        }

        let results = dispatch_tool_calls(session, profile, env, &tool_calls).await;
        session
            .append_turn(Turn::ToolResults {
                results,
                created_at: chrono::Utc::now(),
            })
            .await;

        inject_steering(session).await;

        let history = session.history().await;
        if detect_loop(&history, session.config.loop_detection_window) {
            session.emit(EventKind::LoopDetection, vec![]).await;
            session
                .append_turn(Turn::steering(
                    "Loop detected: the last several tool calls repeated without making progress. Try a different approach.",
                ))
                .await;
        }
    }
}

async fn inject_steering(session: &Session) {
    for message in session.drain_steering().await {
        session.append_turn(Turn::steering(message.clone())).await;
        session
            .emit(EventKind::SteeringInjected, vec![("text", message.into())])
            .await;
    }
}

/// §7: a cancelled-during-LM-call failure exits the loop cleanly (`Ok`);
/// a genuine client failure with no cancellation in flight propagates as
/// [`RuntimeError::LmClient`].
fn on_lm_error(cancel: &CancellationToken, message: String) -> RuntimeResult<()> {
    if cancel.is_cancelled() {
        Ok(())
    } else {
        Err(RuntimeError::LmClient(message))
    }
}

/// Dispatch a round of tool calls (§4.8.1), preserving input order in the
/// result list regardless of completion order, and running them
/// concurrently only when the active profile allows parallel tool calls
/// and there is more than one call to dispatch.
async fn dispatch_tool_calls(
    session: &Session,
    profile: &dyn ProviderProfile,
    env: &dyn ExecutionEnvironment,
    calls: &[ToolCall],
) -> Vec<ToolCallResult> {
    let overrides = TruncationOverrides::default();

    if profile.parallel_tool_calls() && calls.len() > 1 {
        let futures = calls
            .iter()
            .map(|call| run_one_tool_call(session, profile, env, call, &overrides));
        join_all(futures).await
    } else {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(run_one_tool_call(session, profile, env, call, &overrides).await);
        }
        results
    }
}

async fn run_one_tool_call(
    session: &Session,
    profile: &dyn ProviderProfile,
    env: &dyn ExecutionEnvironment,
    call: &ToolCall,
    overrides: &TruncationOverrides,
) -> ToolCallResult {
    session
        .emit(
            EventKind::ToolCallStart,
            vec![("tool_name", call.name.clone().into()), ("call_id", call.id.clone().into())],
        )
        .await;

    let Some(tool) = profile.tools().get(&call.name) else {
        let message = format!("no such tool: {}", call.name);
        session
            .emit(
                EventKind::ToolCallEnd,
                vec![("call_id", call.id.clone().into()), ("error", message.clone().into())],
            )
            .await;
        return ToolCallResult::error(call.id.clone(), message);
    };

    let outcome = tool.execute(call.arguments.clone(), env).await;

    match outcome {
        Ok(output) => {
            session
                .emit(
                    EventKind::ToolCallEnd,
                    vec![
                        ("call_id", call.id.clone().into()),
                        ("output", output.clone().into()),
                    ],
                )
                .await;
            let truncated = truncate_output(&call.name, &output, overrides);
            ToolCallResult::success(call.id.clone(), truncated)
        }
        Err(e) => {
            let message = e.to_string();
            session
                .emit(
                    EventKind::ToolCallEnd,
                    vec![("call_id", call.id.clone().into()), ("error", message.clone().into())],
                )
                .await;
            ToolCallResult::error(call.id.clone(), message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AnthropicProfile;
    use crate::session::SessionConfig;
    use async_trait::async_trait;
    use futures::stream;
    use mandrel_llm::{LlmResponse, LlmResult, Message, StopReason, StreamBox, Usage};
    use mandrel_tools::LocalExecutionEnvironment;

    struct StaticProvider {
        text: String,
    }

    #[async_trait]
    impl LlmProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        fn model(&self) -> &str {
            "static-model"
        }

        async fn stream(&self, _request: &LlmRequest) -> LlmResult<StreamBox> {
            let events = vec![
                mandrel_llm::StreamEvent::TextStart,
                mandrel_llm::StreamEvent::TextDelta(self.text.clone()),
                mandrel_llm::StreamEvent::TextEnd,
                mandrel_llm::StreamEvent::Finish {
                    usage: Some(Usage::default()),
                    response_id: Some("r1".into()),
                    stop_reason: StopReason::EndTurn,
                },
            ];
            Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
        }

        async fn complete(&self, _request: &LlmRequest) -> LlmResult<LlmResponse> {
            Ok(LlmResponse {
                message: Message::assistant(self.text.clone()),
                has_tool_calls: false,
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
                response_id: Some("r1".into()),
            })
        }

        fn max_context_length(&self) -> usize {
            200_000
        }
    }

    #[tokio::test]
    async fn simple_text_completion_appends_one_assistant_turn() {
        let session = Session::new(SessionConfig::default());
        let profile = AnthropicProfile::new();
        let env = LocalExecutionEnvironment::new(std::env::temp_dir(), mandrel_tools::EnvInheritPolicy::default());
        let client = StaticProvider {
            text: "hello there".into(),
        };
        let cancel = CancellationToken::new();

        process_input(&cancel, &session, &profile, &env, &client, "hi").await.unwrap();

        let history = session.history().await;
        assert!(history.iter().any(|t| matches!(t, Turn::Assistant { content, .. } if content == "hello there")));
        assert_eq!(session.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn follow_up_runs_after_current_input_completes() {
        let session = Session::new(SessionConfig::default());
        let profile = AnthropicProfile::new();
        let env = LocalExecutionEnvironment::new(std::env::temp_dir(), mandrel_tools::EnvInheritPolicy::default());
        let client = StaticProvider { text: "ok".into() };
        let cancel = CancellationToken::new();

        session.follow_up("second input").await.unwrap();
        process_input(&cancel, &session, &profile, &env, &client, "first input")
            .await
            .unwrap();

        let history = session.history().await;
        let user_turns: Vec<&str> = history
            .iter()
            .filter_map(|t| match t {
                Turn::User { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(user_turns, vec!["first input", "second input"]);
    }

    /// A profile carrying only a fixed tool set, for round-by-round tests
    /// driven by a scripted provider instead of a real model.
    struct ToolProfile {
        tools: mandrel_tools::ToolRegistry,
        parallel: bool,
    }

    impl ToolProfile {
        fn new(tools: Vec<Box<dyn mandrel_tools::BuiltinTool>>, parallel: bool) -> Self {
            let mut registry = mandrel_tools::ToolRegistry::new();
            for tool in tools {
                registry.register(tool).unwrap();
            }
            Self {
                tools: registry,
                parallel,
            }
        }
    }

    impl ProviderProfile for ToolProfile {
        fn id(&self) -> &str {
            "test"
        }

        fn default_model(&self) -> &str {
            "test-model"
        }

        fn base_prompt(&self) -> &str {
            "test agent"
        }

        fn tools(&self) -> &mandrel_tools::ToolRegistry {
            &self.tools
        }

        fn doc_filter(&self) -> mandrel_tools::ProviderDocFilter {
            mandrel_tools::ProviderDocFilter::Universal
        }

        fn parallel_tool_calls(&self) -> bool {
            self.parallel
        }

        fn reasoning(&self) -> bool {
            false
        }

        fn streaming(&self) -> bool {
            false
        }

        fn context_window_size(&self) -> usize {
            200_000
        }
    }

    /// Scenario 2 (spec §8): a tool-calling round followed by a text round.
    #[tokio::test]
    async fn single_tool_round_produces_one_tool_results_turn() {
        use mandrel_test::{tool_call_response, text_response, InMemoryExecutionEnvironment, ScriptedProvider, ScriptedStep};

        let session = Session::new(SessionConfig::default());
        let profile = ToolProfile::new(vec![Box::new(mandrel_test::EchoTool::new())], true);
        let env = InMemoryExecutionEnvironment::new("/work");
        let client = ScriptedProvider::new(
            "test-model",
            vec![
                ScriptedStep::Complete(tool_call_response(vec![(
                    "call-1",
                    "echo_tool",
                    serde_json::json!({ "message": "hello" }),
                )])),
                ScriptedStep::Complete(text_response("The tool said: echo: hello")),
            ],
        );
        let cancel = CancellationToken::new();

        process_input(&cancel, &session, &profile, &env, &client, "Use the echo tool")
            .await
            .unwrap();

        let history = session.history().await;
        assert_eq!(history.len(), 4);
        let Turn::ToolResults { results, .. } = &history[2] else {
            panic!("expected a ToolResults turn at index 2, got {:?}", history[2]);
        };
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("echo: hello"));
        assert!(!results[0].is_error);
        assert_eq!(client.call_count(), 2);
    }

    /// Scenario 4 (spec §8): the round limit trips before a third LM call.
    #[tokio::test]
    async fn round_limit_stops_after_configured_rounds_with_no_error() {
        use mandrel_test::{tool_call_response, InMemoryExecutionEnvironment, ScriptedProvider, ScriptedStep};

        let config = SessionConfig {
            max_tool_rounds_per_input: 2,
            ..SessionConfig::default()
        };
        let session = Session::new(config);
        let profile = ToolProfile::new(vec![Box::new(mandrel_test::EchoTool::new())], true);
        let env = InMemoryExecutionEnvironment::new("/work");
        let step = || {
            ScriptedStep::Complete(tool_call_response(vec![(
                "call-1",
                "echo_tool",
                serde_json::json!({ "message": "again" }),
            )]))
        };
        let client = ScriptedProvider::new("test-model", vec![step(), step()]);
        let cancel = CancellationToken::new();

        process_input(&cancel, &session, &profile, &env, &client, "loop forever")
            .await
            .unwrap();

        assert_eq!(client.call_count(), 2);
        assert_eq!(session.state().await, SessionState::Idle);
    }

    /// Scenario 5 (spec §8): four identical tool calls in a row trip loop
    /// detection and inject a steering turn.
    #[tokio::test]
    async fn repeated_identical_tool_calls_trigger_loop_detection() {
        use mandrel_test::{tool_call_response, text_response, InMemoryExecutionEnvironment, ScriptedProvider, ScriptedStep};

        let config = SessionConfig {
            loop_detection_window: 4,
            ..SessionConfig::default()
        };
        let session = Session::new(config);
        let profile = ToolProfile::new(vec![Box::new(mandrel_test::EchoTool::new())], true);
        let env = InMemoryExecutionEnvironment::new("/work");
        let step = || {
            ScriptedStep::Complete(tool_call_response(vec![(
                "call-1",
                "echo_tool",
                serde_json::json!({ "message": "same" }),
            )]))
        };
        let client = ScriptedProvider::new(
            "test-model",
            vec![step(), step(), step(), step(), ScriptedStep::Complete(text_response("done"))],
        );
        let cancel = CancellationToken::new();

        process_input(&cancel, &session, &profile, &env, &client, "do the thing")
            .await
            .unwrap();

        let history = session.history().await;
        assert!(history.iter().any(
            |t| matches!(t, Turn::Steering { content, .. } if content.contains("Loop detected") || content.contains("repeated"))
        ));
    }

    /// §5/§7: a cancellation observed before a model call exits cleanly,
    /// with no `error` event and no model call ever made.
    #[tokio::test]
    async fn cancellation_before_model_call_exits_without_error() {
        let (_id, mut subscriber) = {
            let session = Session::new(SessionConfig::default());
            let bus_handle = session.event_bus().subscribe().await;
            let profile = AnthropicProfile::new();
            let env =
                LocalExecutionEnvironment::new(std::env::temp_dir(), mandrel_tools::EnvInheritPolicy::default());
            let client = StaticProvider { text: "unused".into() };
            let cancel = CancellationToken::new();
            cancel.cancel();

            let result = process_input(&cancel, &session, &profile, &env, &client, "hi").await;
            assert!(result.is_ok());

            let history = session.history().await;
            assert!(!history.iter().any(|t| matches!(t, Turn::Assistant { .. })));
            assert_eq!(session.state().await, SessionState::Idle);

            bus_handle
        };

        let mut kinds = Vec::new();
        while let Some(event) = subscriber.try_recv() {
            kinds.push(event.kind);
        }
        assert!(!kinds.contains(&mandrel_events::EventKind::Error));
    }
}
