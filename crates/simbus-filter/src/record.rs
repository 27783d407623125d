//! The core-side routing record binding a filter registration to its
//! declared and resolved target identity and its bound operator.

use crate::ops::FilterOperator;
use parking_lot::RwLock;
use simbus_core::{GlobalBrokerId, GlobalFederateId, Handle};
use std::fmt;
use std::sync::Arc;

/// Resolution state of a filter's declared target endpoint.
///
/// Either fully unresolved or fully resolved; there is no partially
/// resolved state. Resolution happens when an endpoint matching the
/// declared target name registers with the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetResolution {
    /// The target endpoint is not (yet) known to the core.
    Unresolved,
    /// The target endpoint's global identity.
    Resolved {
        federate: GlobalFederateId,
        handle: Handle,
    },
}

impl TargetResolution {
    /// Returns true once the target identity is known.
    pub const fn is_resolved(&self) -> bool {
        matches!(self, TargetResolution::Resolved { .. })
    }
}

/// Per-record routing statistics.
#[derive(Debug, Default, Clone)]
pub struct FilterStats {
    /// Messages handed to the bound operator.
    pub processed: u64,
    /// Messages the operator consumed without output.
    pub dropped: u64,
    /// Duplicates emitted by cloning fan-out.
    pub cloned: u64,
    /// Operator faults recovered by pass-through.
    pub faults: u64,
}

impl FilterStats {
    /// Create new filter stats
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for FilterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FilterStats(processed: {}, dropped: {}, cloned: {}, faults: {})",
            self.processed, self.dropped, self.cloned, self.faults
        )
    }
}

/// The routing record for one filter registration.
///
/// Identity fields are fixed at creation. The bound operator and the
/// resolved target are the two mutable fields; both are read on the
/// message path and written only by rare registration-time operations,
/// so they sit behind their own short-lived locks. The record itself is
/// shared as `Arc` between the registry's maps, endpoint chains, and
/// user-facing handles — a retired record stays alive until the last
/// in-flight reference drops.
#[derive(Debug)]
pub struct FilterRecord {
    core_id: GlobalBrokerId,
    handle: Handle,
    name: String,
    target: String,
    input_type: String,
    output_type: String,
    dest_filter: bool,
    cloning: bool,
    operator: RwLock<Option<Arc<dyn FilterOperator>>>,
    resolution: RwLock<TargetResolution>,
    stats: RwLock<FilterStats>,
}

impl FilterRecord {
    pub(crate) fn new(
        core_id: GlobalBrokerId,
        handle: Handle,
        name: String,
        target: String,
        input_type: String,
        output_type: String,
        dest_filter: bool,
        cloning: bool,
    ) -> Self {
        Self {
            core_id,
            handle,
            name,
            target,
            input_type,
            output_type,
            dest_filter,
            cloning,
            operator: RwLock::new(None),
            resolution: RwLock::new(TargetResolution::Unresolved),
            stats: RwLock::new(FilterStats::new()),
        }
    }

    /// Id of the core that owns this record.
    pub fn core_id(&self) -> GlobalBrokerId {
        self.core_id
    }

    /// The record's handle within the owning core.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The filter's identifier (auto-generated when none was supplied).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared target endpoint name.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Declared input type tag.
    pub fn input_type(&self) -> &str {
        &self.input_type
    }

    /// Declared output type tag.
    pub fn output_type(&self) -> &str {
        &self.output_type
    }

    /// True for destination-side filters.
    pub fn is_dest_filter(&self) -> bool {
        self.dest_filter
    }

    /// True for cloning registrations.
    pub fn is_cloning(&self) -> bool {
        self.cloning
    }

    /// The currently bound operator, if any.
    pub fn operator(&self) -> Option<Arc<dyn FilterOperator>> {
        self.operator.read().clone()
    }

    /// Swaps the bound operator. The write lock covers only the pointer
    /// swap; a transform running against the previous operator holds its
    /// own `Arc` and completes undisturbed.
    pub(crate) fn bind_operator(&self, op: Arc<dyn FilterOperator>) {
        *self.operator.write() = Some(op);
    }

    /// Current target resolution state.
    pub fn resolution(&self) -> TargetResolution {
        *self.resolution.read()
    }

    /// Records the resolved target identity. Written once, when the
    /// matching endpoint registers.
    pub(crate) fn resolve(&self, federate: GlobalFederateId, handle: Handle) {
        let mut resolution = self.resolution.write();
        debug_assert!(
            !resolution.is_resolved(),
            "filter target resolved more than once"
        );
        *resolution = TargetResolution::Resolved { federate, handle };
    }

    /// Snapshot of the record's statistics.
    pub fn stats(&self) -> FilterStats {
        self.stats.read().clone()
    }

    pub(crate) fn record_stats(&self, update: impl FnOnce(&mut FilterStats)) {
        update(&mut self.stats.write());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FilterRecord {
        FilterRecord::new(
            GlobalBrokerId::new(0),
            Handle::new(5),
            "flt".to_string(),
            "ept_a".to_string(),
            "raw".to_string(),
            "raw".to_string(),
            false,
            false,
        )
    }

    #[test]
    fn test_identity_accessors() {
        let rec = record();
        assert_eq!(rec.handle(), Handle::new(5));
        assert_eq!(rec.name(), "flt");
        assert_eq!(rec.target(), "ept_a");
        assert_eq!(rec.input_type(), "raw");
        assert_eq!(rec.output_type(), "raw");
        assert!(!rec.is_dest_filter());
        assert!(!rec.is_cloning());
    }

    #[test]
    fn test_resolution_two_state() {
        let rec = record();
        assert!(!rec.resolution().is_resolved());
        rec.resolve(GlobalFederateId::new(3), Handle::new(9));
        match rec.resolution() {
            TargetResolution::Resolved { federate, handle } => {
                assert_eq!(federate, GlobalFederateId::new(3));
                assert_eq!(handle, Handle::new(9));
            }
            TargetResolution::Unresolved => panic!("expected resolved"),
        }
    }

    #[test]
    fn test_stats_accumulate() {
        let rec = record();
        rec.record_stats(|s| {
            s.processed += 1;
            s.dropped += 1;
        });
        let stats = rec.stats();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.dropped, 1);
        assert!(format!("{stats}").contains("processed: 1"));
    }
}
