//! Write file tool — thin wrapper over [`ExecutionEnvironment::write_file`].

use crate::env::ExecutionEnvironment;
use crate::{BuiltinTool, ToolError, ToolResult};
use serde_json::Value;

/// Built-in tool for writing files.
pub struct WriteFileTool;

#[async_trait::async_trait]
impl BuiltinTool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Writes content to a file. Creates parent directories if they don't exist. \
         Overwrites the file if it already exists."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path to the file to write"},
                "content": {"type": "string", "description": "Content to write"},
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, args: Value, env: &dyn ExecutionEnvironment) -> ToolResult {
        let file_path = args
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("file_path is required".into()))?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("content is required".into()))?;

        env.write_file(file_path, content).await?;
        Ok(format!("Wrote {} bytes to {file_path}", content.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::LocalExecutionEnvironment;
    use crate::env_policy::EnvInheritPolicy;
    use tempfile::TempDir;

    fn env(dir: &std::path::Path) -> LocalExecutionEnvironment {
        LocalExecutionEnvironment::new(dir.to_path_buf(), EnvInheritPolicy::Core)
    }

    #[tokio::test]
    async fn writes_and_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");

        let result = WriteFileTool
            .execute(
                serde_json::json!({"file_path": path.to_str().unwrap(), "content": "hi"}),
                &env(dir.path()),
            )
            .await
            .unwrap();

        assert!(result.contains("2 bytes"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi");
    }

    #[tokio::test]
    async fn missing_args_is_invalid_arguments() {
        let dir = TempDir::new().unwrap();
        let result = WriteFileTool
            .execute(serde_json::json!({"file_path": "/tmp/x.txt"}), &env(dir.path()))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
