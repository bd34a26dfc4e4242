//! Commonly used types for convenient import.
//!
//! ```rust
//! use mandrel_runtime::prelude::*;
//! ```

pub use crate::error::{RuntimeError, RuntimeResult};
pub use crate::provider::{AnthropicProfile, GeminiProfile, OpenAiProfile, ProviderProfile, SharedProfile};
pub use crate::session::{Session, SessionConfig, SessionState};
pub use crate::subagent::{SubAgentId, SubAgentPool, SubAgentResult, SubAgentStatus};
pub use crate::turn::Turn;
pub use crate::{process_input, stream};
