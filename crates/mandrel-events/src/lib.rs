//! Non-blocking per-subscriber session event bus (C2, §4.1).
//!
//! Each subscriber gets its own bounded channel; a slow or full subscriber
//! only drops events for itself, and `emit` never blocks the producer.
//!
//! ```rust
//! use mandrel_events::{EventBus, EventKind, SessionEvent};
//! use uuid::Uuid;
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let (_id, mut receiver) = bus.subscribe().await;
//!
//! bus.emit(SessionEvent::new(EventKind::SessionStart, Uuid::nil())).await;
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.kind.as_str(), "session_start");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;

pub use bus::{EventBus, EventReceiver, SubscriberId, DEFAULT_SUBSCRIBER_CAPACITY};
pub use event::{EventKind, SessionEvent};
