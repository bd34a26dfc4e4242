//! Shell execution with process-group timeout enforcement.
//!
//! A plain `tokio::time::timeout` around `Command::output()` only reclaims
//! the direct child; any descendants it spawned (and didn't wait on) keep
//! running. Here the child is placed in its own process group (`setsid`) so
//! a timeout can signal the whole group: `SIGTERM`, a short grace period,
//! then `SIGKILL`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::process::Command;

use crate::env::{ExecOutcome, ExecutionEnvironment};
use crate::{BuiltinTool, ToolError, ToolResult};

/// Default timeout in milliseconds (2 minutes).
const DEFAULT_TIMEOUT_MS: u64 = 120_000;
/// Maximum timeout in milliseconds (10 minutes).
const MAX_TIMEOUT_MS: u64 = 600_000;
/// Grace period between `SIGTERM` and `SIGKILL` on timeout.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Run `command` in its own process group with a timeout; on timeout the
/// whole group is terminated, given [`KILL_GRACE`], then force-killed.
pub(crate) async fn run_in_process_group(
    command: &str,
    cwd: &Path,
    env: &[(OsString, OsString)],
    timeout_ms: u64,
) -> Result<ExecOutcome, ToolError> {
    let start = Instant::now();

    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .env_clear()
        .envs(env.iter().cloned())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    unsafe {
        use std::os::unix::process::CommandExt;
        cmd.pre_exec(|| {
            nix::unistd::setsid().map_err(std::io::Error::from)?;
            Ok(())
        });
    }

    let mut child = cmd.spawn().map_err(ToolError::Io)?;
    let pid = child.id();

    let wait = tokio::time::timeout(Duration::from_millis(timeout_ms), child.wait_with_output());

    match wait.await {
        Ok(Ok(output)) => Ok(ExecOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            timed_out: false,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }),
        Ok(Err(e)) => Err(ToolError::Io(e)),
        Err(_) => {
            kill_process_group(pid);
            Ok(ExecOutcome {
                stdout: String::new(),
                stderr: format!("command timed out after {timeout_ms}ms"),
                exit_code: -1,
                timed_out: true,
                duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let pgid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
    let _ = killpg(pgid, Signal::SIGTERM);
    std::thread::sleep(KILL_GRACE);
    let _ = killpg(pgid, Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Built-in tool for executing shell commands via the environment's
/// `exec_command` operation.
pub struct BashTool;

#[async_trait::async_trait]
impl BuiltinTool for BashTool {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn description(&self) -> &'static str {
        "Executes a shell command. Use for git, build tools, package managers, and other \
         terminal operations. Optional timeout in milliseconds (default 120000, max 600000). \
         If the command times out, output is still returned (partial) so you can retry with a \
         longer timeout."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to execute"},
                "timeout_ms": {"type": "integer", "description": "Timeout in milliseconds"},
                "working_dir": {"type": "string", "description": "Working directory override"},
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, env: &dyn ExecutionEnvironment) -> ToolResult {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("command is required".into()))?;

        let timeout_ms = args
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .min(MAX_TIMEOUT_MS);

        let working_dir = args.get("working_dir").and_then(Value::as_str);

        let env_vars: Option<HashMap<String, String>> = args.get("env").and_then(|v| {
            v.as_object().map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
        });

        let outcome = env
            .exec_command(command, timeout_ms, working_dir, env_vars.as_ref())
            .await?;

        let mut result_text = String::new();
        if !outcome.stdout.is_empty() {
            result_text.push_str(&outcome.stdout);
        }
        if !outcome.stderr.is_empty() {
            if !result_text.is_empty() {
                result_text.push('\n');
            }
            result_text.push_str("STDERR:\n");
            result_text.push_str(&outcome.stderr);
        }
        if outcome.exit_code != 0 {
            if !result_text.is_empty() {
                result_text.push('\n');
            }
            result_text.push_str(&format!("(exit code: {})", outcome.exit_code));
        }
        if result_text.is_empty() {
            result_text.push_str("(no output)");
        }

        // Timeout is not surfaced as a tool error — the model sees partial
        // output and can retry with a longer timeout (spec §7 TimeoutOutcome).
        Ok(result_text)
    }
}
