//! Subagent manager: depth-bounded child sessions (C9, §4.9).

use std::collections::HashMap;
use std::sync::Arc;

use mandrel_llm::LlmProvider;
use mandrel_tools::ExecutionEnvironment;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::conversation::process_input;
use crate::error::{RuntimeError, RuntimeResult};
use crate::provider::SharedProfile;
use crate::session::{Session, SessionConfig};
use crate::turn::Turn;

/// Identifier for one spawned subagent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubAgentId(Uuid);

/// Lifecycle state of a spawned subagent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAgentStatus {
    /// Still processing its task.
    Running,
    /// Finished without error.
    Completed,
    /// Finished with an error.
    Failed,
}

/// What a subagent produced, available once [`SubAgentPool::wait`] returns.
#[derive(Debug, Clone)]
pub struct SubAgentResult {
    /// Last assistant turn's text content, or the error message on failure.
    pub output: String,
    /// Whether the subagent completed successfully.
    pub success: bool,
    /// Turns recorded in the child session's history.
    pub turns_used: usize,
}

struct HandleInner {
    status: Mutex<SubAgentStatus>,
    result: Mutex<Option<SubAgentResult>>,
    done: Notify,
    cancel: CancellationToken,
    child_session: Arc<Session>,
}

struct PoolInner {
    agents: HashMap<SubAgentId, Arc<HandleInner>>,
    current_depth: usize,
}

/// Depth-bounded registry of spawned child sessions.
///
/// A session's subagents run `process_input` against their own child
/// [`Session`] (own history, own event bus) rather than sharing the
/// parent's, so operator steering directed at the parent never leaks to a
/// child.
pub struct SubAgentPool {
    inner: Mutex<PoolInner>,
    max_depth: usize,
}

impl SubAgentPool {
    /// Create a pool that refuses spawns once `max_depth` nested agents are
    /// simultaneously running.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                agents: HashMap::new(),
                current_depth: 0,
            }),
            max_depth,
        }
    }

    /// Spawn a child session to run `task`, returning its id immediately;
    /// the work runs in a background task.
    pub async fn spawn(
        self: &Arc<Self>,
        task: String,
        env: Arc<dyn ExecutionEnvironment>,
        profile: SharedProfile,
        client: Arc<dyn LlmProvider>,
        max_turns: usize,
    ) -> RuntimeResult<SubAgentId> {
        let mut pool = self.inner.lock().await;
        if pool.current_depth >= self.max_depth {
            return Err(RuntimeError::SubagentDepthExceeded {
                current: pool.current_depth,
                max: self.max_depth,
            });
        }
        pool.current_depth += 1;

        let mut config = SessionConfig {
            max_turns,
            max_subagent_depth: 0,
            ..SessionConfig::default()
        };
        config.model = profile.default_model().to_string();
        let child_session = Arc::new(Session::new(config));
        let cancel = CancellationToken::new();

        let handle = Arc::new(HandleInner {
            status: Mutex::new(SubAgentStatus::Running),
            result: Mutex::new(None),
            done: Notify::new(),
            cancel: cancel.clone(),
            child_session: Arc::clone(&child_session),
        });

        let id = SubAgentId(Uuid::new_v4());
        pool.agents.insert(id, Arc::clone(&handle));
        drop(pool);

        let pool_for_worker = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = process_input(
                &cancel,
                &child_session,
                profile.as_ref(),
                env.as_ref(),
                client.as_ref(),
                &task,
            )
            .await;

            let turns_used = child_session.turn_count().await;
            let history = child_session.history().await;
            let last_assistant_text = history.iter().rev().find_map(|t| match t {
                Turn::Assistant { content, .. } => Some(content.clone()),
                _ => None,
            });

            let (success, output) = match outcome {
                Ok(()) => (true, last_assistant_text.unwrap_or_default()),
                Err(e) => (false, e.to_string()),
            };

            *handle.status.lock().await = if success {
                SubAgentStatus::Completed
            } else {
                SubAgentStatus::Failed
            };
            *handle.result.lock().await = Some(SubAgentResult {
                output,
                success,
                turns_used,
            });
            handle.done.notify_waiters();

            let mut pool = pool_for_worker.inner.lock().await;
            pool.current_depth = pool.current_depth.saturating_sub(1);
        });

        Ok(id)
    }

    async fn get(&self, id: SubAgentId) -> RuntimeResult<Arc<HandleInner>> {
        self.inner
            .lock()
            .await
            .agents
            .get(&id)
            .cloned()
            .ok_or(RuntimeError::UnknownSubagent(format!("{:?}", id.0)))
    }

    /// Enqueue a steering message for a running subagent. A no-op, not an
    /// error, once the agent has finished.
    pub async fn send_input(&self, id: SubAgentId, message: impl Into<String>) -> RuntimeResult<()> {
        let handle = self.get(id).await?;
        if *handle.status.lock().await == SubAgentStatus::Running {
            handle.child_session.steer(message).await?;
        }
        Ok(())
    }

    /// Block until a subagent's `done` gate fires and return its result.
    pub async fn wait(&self, id: SubAgentId) -> RuntimeResult<SubAgentResult> {
        let handle = self.get(id).await?;
        loop {
            let notified = handle.done.notified();
            if let Some(result) = handle.result.lock().await.clone() {
                return Ok(result);
            }
            notified.await;
        }
    }

    /// Cancel a subagent's context and await its gate.
    pub async fn close(&self, id: SubAgentId) -> RuntimeResult<()> {
        let handle = self.get(id).await?;
        handle.cancel.cancel();
        handle.child_session.close().await;
        loop {
            let notified = handle.done.notified();
            if handle.result.lock().await.is_some() {
                return Ok(());
            }
            notified.await;
        }
    }

    /// Cancel every subagent and await each gate.
    pub async fn close_all(&self) {
        let ids: Vec<SubAgentId> = self.inner.lock().await.agents.keys().copied().collect();
        for id in ids {
            let _ = self.close(id).await;
        }
    }
}

/// Builtin tools exposing the subagent pool to the model (§4.9): one
/// `Arc<SubAgentPool>` is shared across all four.
pub mod tools {
    use super::{Arc, SubAgentId, SubAgentPool};
    use async_trait::async_trait;
    use mandrel_llm::LlmProvider;
    use mandrel_tools::{BuiltinTool, ExecutionEnvironment, ToolError, ToolResult};
    use serde_json::{json, Value};
    use uuid::Uuid;

    fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
        args.get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing `{key}` argument")))
    }

    fn parse_id(args: &Value) -> Result<SubAgentId, ToolError> {
        let raw = arg_str(args, "id")?;
        let uuid = Uuid::parse_str(raw)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid subagent id: {e}")))?;
        Ok(SubAgentId(uuid))
    }

    /// Spawns a new subagent to work on a task, independent of the caller's
    /// own history.
    pub struct SpawnAgentTool {
        pool: Arc<SubAgentPool>,
        env: Arc<dyn ExecutionEnvironment>,
        profile: crate::provider::SharedProfile,
        client: Arc<dyn LlmProvider>,
        max_turns: usize,
    }

    impl SpawnAgentTool {
        /// Build the tool around a shared pool and the resources a spawned
        /// child session needs to run its own conversation loop.
        #[must_use]
        pub fn new(
            pool: Arc<SubAgentPool>,
            env: Arc<dyn ExecutionEnvironment>,
            profile: crate::provider::SharedProfile,
            client: Arc<dyn LlmProvider>,
            max_turns: usize,
        ) -> Self {
            Self {
                pool,
                env,
                profile,
                client,
                max_turns,
            }
        }
    }

    #[async_trait]
    impl BuiltinTool for SpawnAgentTool {
        fn name(&self) -> &'static str {
            "spawn_agent"
        }

        fn description(&self) -> &'static str {
            "Spawn a subagent to independently work on a task and report back its final answer."
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "task": { "type": "string" } },
                "required": ["task"],
            })
        }

        async fn execute(&self, args: Value, _env: &dyn ExecutionEnvironment) -> ToolResult {
            let task = arg_str(&args, "task")?.to_string();
            let id = self
                .pool
                .spawn(
                    task,
                    Arc::clone(&self.env),
                    Arc::clone(&self.profile),
                    Arc::clone(&self.client),
                    self.max_turns,
                )
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            Ok(json!({ "id": id.0.to_string() }).to_string())
        }
    }

    /// Sends a steering message to a running subagent.
    pub struct SendInputTool {
        pool: Arc<SubAgentPool>,
    }

    impl SendInputTool {
        /// Build the tool around a shared pool.
        #[must_use]
        pub fn new(pool: Arc<SubAgentPool>) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl BuiltinTool for SendInputTool {
        fn name(&self) -> &'static str {
            "send_input"
        }

        fn description(&self) -> &'static str {
            "Send a steering message to a running subagent."
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" }, "message": { "type": "string" } },
                "required": ["id", "message"],
            })
        }

        async fn execute(&self, args: Value, _env: &dyn ExecutionEnvironment) -> ToolResult {
            let id = parse_id(&args)?;
            let message = arg_str(&args, "message")?.to_string();
            self.pool
                .send_input(id, message)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            Ok(json!({ "ok": true }).to_string())
        }
    }

    /// Blocks until a subagent finishes and returns its result.
    pub struct WaitTool {
        pool: Arc<SubAgentPool>,
    }

    impl WaitTool {
        /// Build the tool around a shared pool.
        #[must_use]
        pub fn new(pool: Arc<SubAgentPool>) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl BuiltinTool for WaitTool {
        fn name(&self) -> &'static str {
            "wait"
        }

        fn description(&self) -> &'static str {
            "Block until a subagent finishes and return its result."
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"],
            })
        }

        async fn execute(&self, args: Value, _env: &dyn ExecutionEnvironment) -> ToolResult {
            let id = parse_id(&args)?;
            let result = self
                .pool
                .wait(id)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            Ok(json!({
                "output": result.output,
                "success": result.success,
                "turns_used": result.turns_used,
            })
            .to_string())
        }
    }

    /// Cancels a subagent and awaits its exit.
    pub struct CloseAgentTool {
        pool: Arc<SubAgentPool>,
    }

    impl CloseAgentTool {
        /// Build the tool around a shared pool.
        #[must_use]
        pub fn new(pool: Arc<SubAgentPool>) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl BuiltinTool for CloseAgentTool {
        fn name(&self) -> &'static str {
            "close_agent"
        }

        fn description(&self) -> &'static str {
            "Cancel a subagent and wait for it to exit."
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "id": { "type": "string" } },
                "required": ["id"],
            })
        }

        async fn execute(&self, args: Value, _env: &dyn ExecutionEnvironment) -> ToolResult {
            let id = parse_id(&args)?;
            self.pool
                .close(id)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            Ok(json!({ "ok": true }).to_string())
        }
    }
}
