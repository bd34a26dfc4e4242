//! Runtime error types (§7 error taxonomy).

use thiserror::Error;

/// Errors that can occur in the runtime.
///
/// Tool-recoverable failures (validation, registry miss, tool execution,
/// patch parse) never appear here — they become a `ToolCallResult` with
/// `is_error=true` so the model can recover. Only failures that terminate
/// `process_input` are represented.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The language-model client returned an error (and the call was not
    /// cancelled). Emitted as an `error` session event before being
    /// returned.
    #[error("language model client error: {0}")]
    LmClient(String),

    /// A subagent spawn was refused because the pool is already at its
    /// configured depth limit.
    #[error("subagent depth {current} exceeds maximum {max}")]
    SubagentDepthExceeded {
        /// Current depth.
        current: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Operation attempted against a session that has already been closed.
    #[error("session is closed")]
    SessionClosed,

    /// Referenced subagent id is not registered in the pool.
    #[error("unknown subagent: {0}")]
    UnknownSubagent(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
