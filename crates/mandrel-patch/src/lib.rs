#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Parser and applier for the v4a patch format (C4, §4.4, §6).

mod applier;
mod apply_patch_tool;
mod error;
mod parser;
mod types;

pub use applier::apply_patch;
pub use apply_patch_tool::ApplyPatchTool;
pub use error::{PatchError, PatchResult};
pub use parser::parse_patch;
pub use types::{ApplyResult, Hunk, Operation, OperationResult, Patch};
