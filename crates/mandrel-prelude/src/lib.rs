//! Unified prelude for the mandrel conversation runtime.
//!
//! This crate provides a single import to bring in all commonly used types
//! from across the workspace. Use this when you need types from multiple
//! crates without managing individual imports.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mandrel_prelude::*;
//!
//! // Now you have access to types from:
//! // - mandrel-llm (LlmProvider, messages, streaming)
//! // - mandrel-events (event bus)
//! // - mandrel-tools (execution environment, built-in tools, registry)
//! // - mandrel-patch (v4a patch parser and applier)
//! // - mandrel-runtime (Session, provider profiles, subagents)
//! ```
//!
//! # Per-Crate Preludes
//!
//! If you only need types from specific crates, use their individual
//! preludes where one exists:
//!
//! ```rust,ignore
//! use mandrel_llm::prelude::*;
//! use mandrel_events::prelude::*;
//! use mandrel_runtime::prelude::*;
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mandrel_prelude::*;
//!
//! # async fn example(client: impl LlmProvider) -> RuntimeResult<()> {
//! let tools = ToolRegistry::with_defaults();
//! let profile = AnthropicProfile::new(tools);
//! let config = SessionConfig::default();
//! let session = Session::new(client, profile, config);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

// mandrel-llm: provider trait, messages, streaming, tool calls
pub use mandrel_llm::prelude::*;

// mandrel-events: event bus and session events
pub use mandrel_events::prelude::*;

// mandrel-tools: execution environment, built-in tools, registry
pub use mandrel_tools::{
    BuiltinTool, EnvInheritPolicy, ExecOutcome, ExecutionEnvironment, GrepMatch, GrepOptions,
    LocalExecutionEnvironment, ProviderDocFilter, ToolError, ToolRegistry, ToolResult,
};

// mandrel-patch: v4a patch parser and applier
pub use mandrel_patch::{
    apply_patch, parse_patch, ApplyResult, Hunk, Operation, OperationResult, Patch, PatchError,
    PatchResult,
};

// mandrel-runtime: session, provider profiles, subagents, turns
pub use mandrel_runtime::prelude::*;
