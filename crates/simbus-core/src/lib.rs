//! # SimBus Core
//!
//! Core types and error handling for the SimBus co-simulation message bus.
//!
//! This crate provides the foundational building blocks shared by the bus
//! components:
//!
//! - **Types**: identifier newtypes for the two addressing domains —
//!   core-local [`types::Handle`] / [`types::FilterId`] and cluster-wide
//!   [`types::GlobalFederateId`] / [`types::GlobalBrokerId`].
//! - **Time**: [`time::SimTime`], the fixed-point logical timestamp that
//!   delay filters shift; nothing in the core blocks on wall-clock time.
//! - **Message**: the [`message::Message`] record relayed between endpoints,
//!   with provenance fields preserved across reroutes and clones.
//! - **Errors**: a `thiserror` taxonomy separating configuration errors,
//!   registry errors, and runtime operator faults.
//!
//! ## Example
//!
//! ```
//! use simbus_core::message::Message;
//! use simbus_core::time::SimTime;
//!
//! let msg = Message::new("sender", "receiver", "payload", SimTime::ZERO);
//! let delayed = msg.time.saturating_add(SimTime::from_secs_f64(0.5));
//! assert_eq!(delayed, SimTime::from_secs_f64(0.5));
//! ```

pub mod error;
pub mod message;
pub mod time;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{BusError, ConfigError, OperatorError, RegistryError, Result};
pub use message::Message;
pub use time::SimTime;
pub use types::{FilterId, GlobalBrokerId, GlobalFederateId, Handle};
