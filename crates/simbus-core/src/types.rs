//! Identifier types for the SimBus co-simulation message bus.
//!
//! Two addressing domains coexist in the bus. Handles are process-local
//! integers assigned by the core that owns the interface; global identifiers
//! are cluster-wide and only become known once a federate or sub-broker has
//! joined. Keeping them as distinct newtypes makes it impossible to hand a
//! local handle to an API expecting a resolved global identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Core-assigned identifier for one registered interface point (an endpoint
/// or a filter) within a core.
///
/// Handles are allocated monotonically and never reused while the core runs.
///
/// # Examples
///
/// ```
/// use simbus_core::types::Handle;
///
/// let h = Handle::new(3);
/// assert_eq!(h.raw(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u32);

impl Handle {
    /// Creates a handle from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Federate-facing identifier for a filter.
///
/// Numbered in a distinct space from [`Handle`]: a federate session counts
/// the filters it created starting from zero, regardless of how many other
/// interfaces the core has registered in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterId(u32);

impl FilterId {
    /// Distinguished sentinel for "no filter".
    pub const INVALID: FilterId = FilterId(u32::MAX);

    /// Creates a filter id from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Returns true unless this is the invalid sentinel.
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "f{}", self.0)
        } else {
            write!(f, "f-invalid")
        }
    }
}

/// Cluster-wide identifier for a federate, assigned when it joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalFederateId(u32);

impl GlobalFederateId {
    /// Creates a federate id from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GlobalFederateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fed{}", self.0)
    }
}

/// Cluster-wide identifier for a core or sub-broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalBrokerId(u32);

impl GlobalBrokerId {
    /// Creates a broker id from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GlobalBrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broker{}", self.0)
    }
}
