//! `apply_patch` built-in tool: exposes the v4a engine to the model.

use mandrel_tools::{BuiltinTool, ExecutionEnvironment, ToolError, ToolResult};
use serde_json::Value;

use crate::applier::apply_patch;
use crate::parser::parse_patch;

/// Parses and applies a v4a patch document against the execution
/// environment.
pub struct ApplyPatchTool;

#[async_trait::async_trait]
impl BuiltinTool for ApplyPatchTool {
    fn name(&self) -> &'static str {
        "apply_patch"
    }

    fn description(&self) -> &'static str {
        "Apply a patch in the *** Begin Patch / *** End Patch format to add, delete, update, or move files."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "patch": {
                    "type": "string",
                    "description": "The full patch document, including the Begin/End Patch markers."
                }
            },
            "required": ["patch"]
        })
    }

    async fn execute(&self, args: Value, env: &dyn ExecutionEnvironment) -> ToolResult {
        let patch_text = args
            .get("patch")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("patch is required".into()))?;

        let patch = parse_patch(patch_text)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let result = apply_patch(&patch, env)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        Ok(result.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mandrel_tools::{EnvInheritPolicy, LocalExecutionEnvironment};
    use tempfile::TempDir;

    #[tokio::test]
    async fn applies_add_and_returns_summary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        let env = LocalExecutionEnvironment::new(dir.path().to_path_buf(), EnvInheritPolicy::Core);

        let args = serde_json::json!({
            "patch": format!(
                "*** Begin Patch\n*** Add File: {}\n+hello\n*** End Patch\n",
                path.display()
            )
        });

        let tool = ApplyPatchTool;
        let output = tool.execute(args, &env).await.unwrap();
        assert_eq!(output, "1 created");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn missing_patch_arg_is_invalid_arguments() {
        let dir = TempDir::new().unwrap();
        let env = LocalExecutionEnvironment::new(dir.path().to_path_buf(), EnvInheritPolicy::Core);
        let tool = ApplyPatchTool;
        let err = tool.execute(serde_json::json!({}), &env).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn malformed_patch_is_invalid_arguments() {
        let dir = TempDir::new().unwrap();
        let env = LocalExecutionEnvironment::new(dir.path().to_path_buf(), EnvInheritPolicy::Core);
        let tool = ApplyPatchTool;
        let err = tool
            .execute(serde_json::json!({"patch": "not a patch"}), &env)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
