//! Read file tool — thin wrapper over [`ExecutionEnvironment::read_file`].

use crate::env::ExecutionEnvironment;
use crate::{BuiltinTool, ToolError, ToolResult};
use serde_json::Value;

/// Built-in tool for reading files.
pub struct ReadFileTool;

#[async_trait::async_trait]
impl BuiltinTool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Reads a file from the filesystem. Returns contents with line numbers. \
         Default reads up to 2000 lines. Use offset and limit for large files."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path to the file to read"},
                "offset": {"type": "integer", "description": "1-based line to start from (0 = start)"},
                "limit": {"type": "integer", "description": "Number of lines to read (0 = default 2000)"},
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value, env: &dyn ExecutionEnvironment) -> ToolResult {
        let file_path = args
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("file_path is required".into()))?;

        let offset = args
            .get("offset")
            .and_then(Value::as_u64)
            .map_or(0, |v| usize::try_from(v).unwrap_or(usize::MAX));
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(0, |v| usize::try_from(v).unwrap_or(usize::MAX));

        env.read_file(file_path, offset, limit).await
    }
}
