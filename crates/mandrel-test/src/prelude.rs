//! Commonly used types for convenient import.
//!
//! ```rust
//! use mandrel_test::prelude::*;
//! ```

pub use crate::fixtures::{init_tracing, temp_local_env, test_id, EchoTool, SleepTool};
pub use crate::mock_env::InMemoryExecutionEnvironment;
pub use crate::mock_llm::{
    tool_call_response, tool_call_stream, text_response, text_stream, ScriptedProvider,
    ScriptedStep,
};
