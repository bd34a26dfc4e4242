//! Grep tool — thin wrapper over [`ExecutionEnvironment::grep`].

use crate::env::{ExecutionEnvironment, GrepOptions};
use crate::{BuiltinTool, ToolError, ToolResult};
use serde_json::Value;
use std::fmt::Write as _;

/// Built-in tool for searching file contents.
pub struct GrepTool;

#[async_trait::async_trait]
impl BuiltinTool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Searches file contents for a regex pattern. Returns file:line:content records."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regex pattern"},
                "path": {"type": "string", "description": "Directory to search"},
                "glob": {"type": "string", "description": "Restrict to files matching this glob"},
                "case_insensitive": {"type": "boolean", "description": "Case-insensitive match"},
                "max_results": {"type": "integer", "description": "Stop after this many matches"},
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

        let opts = GrepOptions {
            glob_filter: args
                .get("glob")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            case_insensitive: args
                .get("case_insensitive")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            max_results: args
                .get("max_results")
                .and_then(Value::as_u64)
                .map_or(0, |v| usize::try_from(v).unwrap_or(usize::MAX)),
        };

        let matches = env.grep(pattern, path, &opts).await?;
        if matches.is_empty() {
            return Ok(format!("No matches for \"{pattern}\""));
        }

        let mut output = String::new();
        for m in &matches {
            let _ = writeln!(output, "{}:{}:{}", m.path, m.line, m.content);
        }
        Ok(output)
    }
}
