//! Prelude module - commonly used types for convenient import.
//!
//! Use `use mandrel_llm::prelude::*;` to import all essential types.
//!
//! No concrete provider is exported here — bring your own [`LlmProvider`]
//! implementation, or use `mandrel_test`'s scripted mock provider in tests.

// Errors
pub use crate::{LlmError, LlmResult};

// Provider trait, request, and config
pub use crate::{LlmProvider, LlmRequest, ProviderConfig, StreamBox};

// Message types
pub use crate::{ContentPart, Message, MessageContent, MessageRole};

// Response types
pub use crate::{LlmResponse, StopReason, StreamEvent, Usage};

// Tool types
pub use crate::{LlmToolDefinition, ToolCall, ToolCallResult};
