//! Message filtering and routing for the SimBus co-simulation bus.
//!
//! This crate is the core's filter machinery: user code interposes filters
//! on the path a message takes between a source endpoint and a destination
//! endpoint, and the core routes every transiting message through the
//! matching filter chains. A filter can delay a message, randomly drop it,
//! reroute its destination, clone it to additional recipients, or apply a
//! custom transform — without the sending or receiving federate's endpoint
//! code changing.
//!
//! - Built-in operator kinds: `delay`, `randomDelay`, `randomDrop`,
//!   `reroute`, `clone`, plus `custom` for injected transforms.
//! - Source, destination, and cloning filter variants behind one
//!   capability surface ([`filter::FilterView`]).
//! - Lazy target resolution: filters may be declared before their target
//!   endpoint exists and activate when it registers.
//! - Concurrent routing: chain snapshots under read locks, transforms
//!   outside all locks, FIFO per endpoint.
//! - Declarative YAML configuration ([`config::FilterSetConfig`]).
//!
//! # Examples
//!
//! ## Delaying traffic out of an endpoint
//!
//! ```rust
//! use std::sync::Arc;
//! use simbus_core::{GlobalBrokerId, GlobalFederateId, Message, SimTime};
//! use simbus_filter::filter::{make_source_filter, FilterView};
//! use simbus_filter::kind::FilterKind;
//! use simbus_filter::registry::FilterRegistry;
//!
//! let registry = Arc::new(FilterRegistry::new(GlobalBrokerId::new(0)));
//! let fed = GlobalFederateId::new(1);
//! registry.register_endpoint(fed, "ept_a").unwrap();
//! registry.register_endpoint(fed, "ept_b").unwrap();
//!
//! let filt = make_source_filter(FilterKind::Delay, &registry, "ept_a", "slow-link").unwrap();
//! filt.set("delay", 0.5).unwrap();
//!
//! let msg = Message::new("ept_a", "ept_b", "hello", SimTime::ZERO);
//! let out = registry.route_send(msg).unwrap();
//! assert_eq!(out.len(), 1);
//! assert_eq!(out[0].time, SimTime::from_secs_f64(0.5));
//! ```
//!
//! ## Tee-ing traffic to an audit endpoint
//!
//! ```rust
//! use std::sync::Arc;
//! use simbus_core::{GlobalBrokerId, GlobalFederateId, Message, SimTime};
//! use simbus_filter::filter::make_cloning_filter;
//! use simbus_filter::registry::FilterRegistry;
//!
//! let registry = Arc::new(FilterRegistry::new(GlobalBrokerId::new(0)));
//! let fed = GlobalFederateId::new(1);
//! registry.register_endpoint(fed, "ept_a").unwrap();
//!
//! let tap = make_cloning_filter(&registry, "audit-tap").unwrap();
//! tap.add_source_target("ept_a").unwrap();
//! tap.add_delivery_endpoint("audit");
//!
//! let out = registry
//!     .route_send(Message::new("ept_a", "ept_b", "hello", SimTime::ZERO))
//!     .unwrap();
//! assert_eq!(out.len(), 2);
//! assert_eq!(out[0].dest, "ept_b"); // original, undisturbed
//! assert_eq!(out[1].dest, "audit"); // the clone
//! ```

pub mod config;
pub mod filter;
pub mod kind;
pub mod ops;
pub mod record;
pub mod registry;
pub mod retire;

// Re-export commonly used types
pub use config::{FilterDef, FilterSetConfig};
pub use filter::{
    make_cloning_filter, make_destination_filter, make_source_filter, AnyFilter, CloningFilter,
    DestinationFilter, FilterView, SourceFilter,
};
pub use kind::FilterKind;
pub use ops::{
    CloneOperator, CustomOperator, DelayOperator, FilterOperator, RandomDelayOperator,
    RandomDropOperator, RerouteOperator,
};
pub use record::{FilterRecord, FilterStats, TargetResolution};
pub use registry::{FilterRegistration, FilterRegistry, FilterSide, FilterSpec, RegistryMetrics};
pub use retire::DeferredRetirer;
