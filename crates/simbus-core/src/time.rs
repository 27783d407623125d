//! Logical simulation time.
//!
//! Timestamps on the bus are logical delivery times consumed by the
//! time-coordination layer, not wall-clock instants. `SimTime` stores
//! nanoseconds in a fixed-point i64 so repeated delay arithmetic stays exact;
//! the float-seconds constructors exist for the property-setting surface,
//! which speaks in seconds.

use serde::{Deserialize, Serialize};
use std::fmt;

const NANOS_PER_SEC: f64 = 1e9;

/// A fixed-point logical timestamp or time offset, in nanoseconds.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SimTime(i64);

impl SimTime {
    /// Time zero, the start of the simulation epoch.
    pub const ZERO: SimTime = SimTime(0);

    /// Creates a timestamp from raw nanoseconds.
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Creates a timestamp from seconds.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * NANOS_PER_SEC) as i64)
    }

    /// Returns the raw nanosecond count.
    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    /// Returns the timestamp as seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC
    }

    /// Shifts this timestamp forward by `offset`, saturating at the
    /// representable extremes.
    pub const fn saturating_add(self, offset: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(offset.0))
    }

    /// Returns true for negative offsets.
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs_f64())
    }
}
