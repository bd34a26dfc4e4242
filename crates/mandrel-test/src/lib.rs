//! Mandrel Test — shared test doubles for the mandrel runtime crates.
//!
//! This crate provides mock implementations and test helpers used across
//! multiple mandrel crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! mandrel-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust
//! use mandrel_test::{mock_llm::{text_response, ScriptedProvider, ScriptedStep}, InMemoryExecutionEnvironment};
//!
//! # async fn example() {
//! let provider = ScriptedProvider::new(
//!     "test-model",
//!     vec![ScriptedStep::Complete(text_response("Hello there!"))],
//! );
//! let env = InMemoryExecutionEnvironment::new("/work");
//! # let _ = (&provider, &env);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mock_env;
pub mod mock_llm;
pub mod prelude;

pub use fixtures::{init_tracing, temp_local_env, test_id, EchoTool, SleepTool};
pub use mock_env::InMemoryExecutionEnvironment;
pub use mock_llm::{tool_call_response, tool_call_stream, text_response, text_stream, ScriptedProvider, ScriptedStep};
