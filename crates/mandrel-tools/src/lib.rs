#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Execution environment, built-in tools, registry, and output truncation
//! for the mandrel conversation loop (C1, C3).

mod bash;
mod edit_file;
pub mod env;
pub mod env_policy;
mod glob;
mod grep;
mod list_directory;
mod read_file;
mod system_prompt;
pub mod truncate;
mod write_file;

pub use bash::BashTool;
pub use edit_file::EditFileTool;
pub use env::{ExecOutcome, ExecutionEnvironment, GrepMatch, GrepOptions, LocalExecutionEnvironment};
pub use env_policy::EnvInheritPolicy;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use system_prompt::{build_system_prompt, ProviderDocFilter};
pub use truncate::{truncate_output, TruncateMode, TruncationOverrides};
pub use write_file::WriteFileTool;

use mandrel_llm::LlmToolDefinition;
use serde_json::Value;
use std::collections::HashMap;

/// Tool execution errors (spec §7: surfaced to the model as a tool-result
/// error message, never propagated up through the conversation loop).
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or wrong-typed tool arguments.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool's underlying operation failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Referenced path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// The operation exceeded its timeout.
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

/// Result type for tool execution.
pub type ToolResult = Result<String, ToolError>;

/// A built-in tool that executes directly in-process against an
/// [`ExecutionEnvironment`].
#[async_trait::async_trait]
pub trait BuiltinTool: Send + Sync {
    /// Tool name (unique within a registry).
    fn name(&self) -> &'static str;

    /// Human-readable description for the model.
    fn description(&self) -> &'static str;

    /// JSON schema for tool input parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments against `env`.
    async fn execute(&self, args: Value, env: &dyn ExecutionEnvironment) -> ToolResult;
}

/// Registry of built-in tools for lookup and LLM-tool-definition export
/// (C3). Registration rejects an empty tool name; all other operations are
/// simple map lookups.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn BuiltinTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with the standard coding tool set registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ReadFileTool)).expect("built-in name");
        registry.register(Box::new(WriteFileTool)).expect("built-in name");
        registry.register(Box::new(EditFileTool)).expect("built-in name");
        registry.register(Box::new(GlobTool)).expect("built-in name");
        registry.register(Box::new(GrepTool)).expect("built-in name");
        registry.register(Box::new(BashTool)).expect("built-in name");
        registry.register(Box::new(ListDirectoryTool)).expect("built-in name");
        registry
    }

    /// Register a tool. Rejects an empty name.
    pub fn register(&mut self, tool: Box<dyn BuiltinTool>) -> Result<(), ToolError> {
        let name = tool.name();
        if name.is_empty() {
            return Err(ToolError::InvalidArguments(
                "tool name must not be empty".into(),
            ));
        }
        self.tools.insert(name.to_string(), tool);
        Ok(())
    }

    /// Remove a tool by name, returning whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn BuiltinTool> {
        self.tools.get(name).map(AsRef::as_ref)
    }

    /// Whether a tool is registered under `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered tool names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Export tool definitions for the model, sorted by name (spec §4.10
    /// requires a stable, sorted tool listing in the system prompt).
    #[must_use]
    pub fn all_definitions(&self) -> Vec<LlmToolDefinition> {
        let mut defs: Vec<LlmToolDefinition> = self
            .tools
            .values()
            .map(|t| {
                LlmToolDefinition::new(t.name())
                    .with_description(t.description())
                    .with_schema(t.input_schema())
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_with_defaults_has_all_tools() {
        let registry = ToolRegistry::with_defaults();
        for name in [
            "read_file",
            "write_file",
            "edit_file",
            "glob",
            "grep",
            "bash",
            "list_directory",
        ] {
            assert!(registry.has(name), "missing tool {name}");
        }
        assert_eq!(registry.count(), 7);
        assert!(!registry.has("nonexistent"));
    }

    #[test]
    fn register_rejects_empty_name() {
        struct EmptyNameTool;
        #[async_trait::async_trait]
        impl BuiltinTool for EmptyNameTool {
            fn name(&self) -> &'static str {
                ""
            }
            fn description(&self) -> &'static str {
                ""
            }
            fn input_schema(&self) -> Value {
                serde_json::json!({})
            }
            async fn execute(&self, _args: Value, _env: &dyn ExecutionEnvironment) -> ToolResult {
                Ok(String::new())
            }
        }

        let mut registry = ToolRegistry::new();
        assert!(registry.register(Box::new(EmptyNameTool)).is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let registry = ToolRegistry::with_defaults();
        let defs = registry.all_definitions();
        let mut sorted = defs.clone();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            defs.iter().map(|d| &d.name).collect::<Vec<_>>(),
            sorted.iter().map(|d| &d.name).collect::<Vec<_>>()
        );
    }

    #[test]
    fn unregister_removes_tool() {
        let mut registry = ToolRegistry::with_defaults();
        assert!(registry.unregister("bash"));
        assert!(!registry.has("bash"));
        assert!(!registry.unregister("bash"));
    }
}
