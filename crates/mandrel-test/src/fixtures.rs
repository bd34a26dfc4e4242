//! Small fixture builders and stand-in tools shared across test modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use mandrel_tools::{BuiltinTool, EnvInheritPolicy, ExecutionEnvironment, LocalExecutionEnvironment, ToolError, ToolResult};
use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;

/// A fresh random id, useful anywhere a test needs *a* id without caring
/// about its value.
#[must_use]
pub fn test_id() -> Uuid {
    Uuid::new_v4()
}

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber for test output, once per process.
///
/// Safe to call from every test; subsequent calls are no-ops.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A temp directory plus a [`LocalExecutionEnvironment`] rooted there, for
/// tests that need real filesystem behavior instead of the in-memory mock.
#[must_use]
pub fn temp_local_env() -> (TempDir, LocalExecutionEnvironment) {
    let dir = TempDir::new().expect("create temp dir");
    let env = LocalExecutionEnvironment::new(dir.path().to_path_buf(), EnvInheritPolicy::Core);
    (dir, env)
}

/// `echo_tool`: returns `"echo: {message}"` for a `{"message": string}`
/// argument. Tracks how many times it has run so dispatch tests can assert
/// call counts.
#[derive(Default)]
pub struct EchoTool {
    call_count: AtomicUsize,
}

impl EchoTool {
    /// A fresh, unused echo tool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `execute` has run.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuiltinTool for EchoTool {
    fn name(&self) -> &'static str {
        "echo_tool"
    }

    fn description(&self) -> &'static str {
        "Echoes back the given message, prefixed with 'echo: '."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "message": { "type": "string" } },
            "required": ["message"],
        })
    }

    async fn execute(&self, args: Value, _env: &dyn ExecutionEnvironment) -> ToolResult {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let message = args
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing `message`".to_string()))?;
        Ok(format!("echo: {message}"))
    }
}

/// `sleep_tool`: sleeps for a fixed duration, then returns a completion
/// marker. Used to exercise parallel tool dispatch's wall-clock bound.
pub struct SleepTool {
    duration: Duration,
}

impl SleepTool {
    /// A tool that sleeps `millis` milliseconds before returning.
    #[must_use]
    pub fn new(millis: u64) -> Self {
        Self {
            duration: Duration::from_millis(millis),
        }
    }
}

#[async_trait]
impl BuiltinTool for SleepTool {
    fn name(&self) -> &'static str {
        "sleep_tool"
    }

    fn description(&self) -> &'static str {
        "Sleeps for a configured duration, then returns."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value, _env: &dyn ExecutionEnvironment) -> ToolResult {
        tokio::time::sleep(self.duration).await;
        Ok("done".to_string())
    }
}
