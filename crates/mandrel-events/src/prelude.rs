//! Commonly used types for convenient import.
//!
//! ```rust
//! use mandrel_events::prelude::*;
//! ```

pub use crate::{EventBus, EventKind, EventReceiver, SessionEvent, SubscriberId};
