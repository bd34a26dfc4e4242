//! Mandrel Runtime — the conversation loop, session state, streaming
//! response assembly, and subagent orchestration on top of
//! `mandrel-llm`, `mandrel-events`, `mandrel-tools`, and `mandrel-patch`.
//!
//! # Architecture
//!
//! A [`Session`](session::Session) holds one conversation's append-only
//! turn history behind a single mutex and its own event bus.
//! [`process_input`](conversation::process_input) drives the model/tool
//! round loop for one user input; [`stream::accumulate`] assembles a
//! streamed response; [`SubAgentPool`](subagent::SubAgentPool) spawns
//! depth-bounded child sessions. A [`ProviderProfile`](provider::ProviderProfile)
//! supplies the vendor-specific tool roster and capability flags the loop
//! itself never branches on.
//!
//! # Example
//!
//! ```rust,no_run
//! use mandrel_runtime::{process_input, Session, SessionConfig};
//! use mandrel_runtime::provider::AnthropicProfile;
//! use mandrel_tools::{EnvInheritPolicy, LocalExecutionEnvironment};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(client: &dyn mandrel_llm::LlmProvider) -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::new(SessionConfig::default());
//! let profile = AnthropicProfile::new();
//! let env = LocalExecutionEnvironment::new(std::env::current_dir()?, EnvInheritPolicy::default());
//! let cancel = CancellationToken::new();
//!
//! process_input(&cancel, &session, &profile, &env, client, "list the files here").await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod conversation;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod stream;
pub mod subagent;
pub mod turn;

pub use conversation::process_input;
pub use error::{RuntimeError, RuntimeResult};
pub use session::{Session, SessionConfig, SessionState};
pub use subagent::{SubAgentId, SubAgentPool, SubAgentResult, SubAgentStatus};
pub use turn::Turn;
