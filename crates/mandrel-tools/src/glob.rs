//! Glob tool — thin wrapper over [`ExecutionEnvironment::glob`].

use crate::env::ExecutionEnvironment;
use crate::{BuiltinTool, ToolError, ToolResult};
use serde_json::Value;
use std::fmt::Write as _;

/// Built-in tool for finding files by glob pattern.
pub struct GlobTool;

#[async_trait::async_trait]
impl BuiltinTool for GlobTool {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn description(&self) -> &'static str {
        "Finds files matching a glob pattern (e.g. \"**/*.rs\"). Returns matching paths \
         sorted by modification time, most recent first."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Glob pattern"},
                "path": {"type": "string", "description": "Directory to search"},
            },
            "required": ["pattern", "path"]
        })
    }

    async fn execute(&self, args: Value, env: &dyn ExecutionEnvironment) -> ToolResult {
        let pattern = args
            .get("pattern")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("pattern is required".into()))?;
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("path is required".into()))?;

        let matches = env.glob(pattern, path).await?;
        if matches.is_empty() {
            return Ok(format!("No files matching \"{pattern}\" found"));
        }

        let mut output = matches.join("\n");
        let _ = write!(output, "\n\n({} files matched)", matches.len());
        Ok(output)
    }
}
