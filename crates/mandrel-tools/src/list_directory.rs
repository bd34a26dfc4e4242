//! List directory tool — thin wrapper over [`ExecutionEnvironment::list_directory`].

use crate::env::ExecutionEnvironment;
use crate::{BuiltinTool, ToolError, ToolResult};
use serde_json::Value;

/// Built-in tool for listing directory contents.
pub struct ListDirectoryTool;

#[async_trait::async_trait]
impl BuiltinTool for ListDirectoryTool {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "Lists the contents of a directory. depth=0 lists immediate children only, \
         depth=-1 recurses without limit."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to list"},
                "depth": {"type": "integer", "description": "0 = immediate children, -1 = unlimited"},
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, env: &dyn ExecutionEnvironment) -> ToolResult {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("path is required".into()))?;
        let depth = args.get("depth").and_then(Value::as_i64).unwrap_or(0);

        env.list_directory(path, depth).await
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
    async fn lists_immediate_children_by_default() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/nested.txt"), "").unwrap();
        std::fs::write(dir.path().join("top.txt"), "").unwrap();

        let result = ListDirectoryTool
            .execute(
                serde_json::json!({"path": dir.path().to_str().unwrap()}),
                &env(dir.path()),
            )
            .await
            .unwrap();

        assert!(result.contains("top.txt"));
        assert!(!result.contains("nested.txt"));
    }

    #[tokio::test]
    async fn missing_path_is_path_not_found() {
        let dir = TempDir::new().unwrap();
        let result = ListDirectoryTool
            .execute(
                serde_json::json!({"path": "/tmp/mandrel_nonexistent_dir_xyz"}),
                &env(dir.path()),
            )
            .await;
        assert!(matches!(result, Err(ToolError::PathNotFound(_))));
    }
}
