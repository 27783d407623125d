//! Core registry: handle allocation, target resolution, and chain routing.
//!
//! Routing runs on the core's message-processing path and may be invoked
//! concurrently from multiple transport threads. The locking discipline:
//! registration and operator rebinding take exclusive locks only for the
//! duration of a map or pointer mutation; the routing path snapshots the
//! relevant chain under a read lock and executes transforms outside all
//! registry locks, since a custom transform may run arbitrary user logic.
//! A per-endpoint, per-side sequencing mutex keeps messages submitted to
//! the same handle in FIFO order while distinct endpoints route in
//! parallel.

use crate::ops::FilterOperator;
use crate::record::{FilterRecord, TargetResolution};
use crate::retire::DeferredRetirer;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::{counter, describe_counter};
use parking_lot::{Mutex, RwLock};
use simbus_core::error::{ConfigError, RegistryError, Result};
use simbus_core::{FilterId, GlobalBrokerId, GlobalFederateId, Handle, Message};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Which side of an endpoint a filter chain guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterSide {
    /// Intercepts messages leaving the endpoint, before any network send.
    Source,
    /// Intercepts messages after network receive, before inbox delivery.
    Destination,
}

/// Registration request for a filter.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    /// Filter name; empty auto-generates one.
    pub name: String,
    /// Declared target endpoint name. Required; the endpoint need not
    /// exist yet.
    pub target: String,
    /// Which side of the target endpoint to intercept.
    pub side: FilterSide,
    /// Declared input type tag.
    pub input_type: String,
    /// Declared output type tag.
    pub output_type: String,
    /// Cloning registrations never gate the chain.
    pub cloning: bool,
}

impl FilterSpec {
    /// Spec for a source-side filter on `target`.
    pub fn source(target: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            target: target.into(),
            side: FilterSide::Source,
            input_type: String::new(),
            output_type: String::new(),
            cloning: false,
        }
    }

    /// Spec for a destination-side filter on `target`.
    pub fn destination(target: impl Into<String>) -> Self {
        Self {
            side: FilterSide::Destination,
            ..Self::source(target)
        }
    }

    /// Sets the filter name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the declared input/output type tags.
    pub fn with_types(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.input_type = input.into();
        self.output_type = output.into();
        self
    }

    /// Marks the registration as cloning.
    pub fn cloning(mut self) -> Self {
        self.cloning = true;
        self
    }
}

/// Identifiers returned by a successful filter registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRegistration {
    /// Core-local handle of the routing record.
    pub handle: Handle,
    /// Federate-facing filter identifier.
    pub id: FilterId,
}

#[derive(Debug)]
struct Chain {
    records: RwLock<Vec<Arc<FilterRecord>>>,
    seq: Mutex<()>,
}

impl Chain {
    fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            seq: Mutex::new(()),
        }
    }
}

#[derive(Debug)]
struct EndpointEntry {
    handle: Handle,
    federate: GlobalFederateId,
    name: String,
    source: Chain,
    dest: Chain,
}

impl EndpointEntry {
    fn new(handle: Handle, federate: GlobalFederateId, name: String) -> Self {
        Self {
            handle,
            federate,
            name,
            source: Chain::new(),
            dest: Chain::new(),
        }
    }

    fn chain(&self, side: FilterSide) -> &Chain {
        match side {
            FilterSide::Source => &self.source,
            FilterSide::Destination => &self.dest,
        }
    }
}

/// Registry routing counters, exported through the metrics facade.
#[derive(Debug)]
pub struct RegistryMetrics {
    messages_routed: AtomicU64,
    messages_dropped: AtomicU64,
    operator_faults: AtomicU64,
}

impl RegistryMetrics {
    fn new() -> Self {
        describe_counter!(
            "simbus_messages_routed_total",
            "Messages emitted by filter chain routing"
        );
        describe_counter!(
            "simbus_messages_dropped_total",
            "Messages consumed by a filter without output"
        );
        describe_counter!(
            "simbus_operator_faults_total",
            "Operator faults recovered by pass-through"
        );

        Self {
            messages_routed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            operator_faults: AtomicU64::new(0),
        }
    }

    fn record_routed(&self, count: usize) {
        self.messages_routed
            .fetch_add(count as u64, Ordering::Relaxed);
        counter!("simbus_messages_routed_total").increment(count as u64);
    }

    fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
        counter!("simbus_messages_dropped_total").increment(1);
    }

    fn record_fault(&self) {
        self.operator_faults.fetch_add(1, Ordering::Relaxed);
        counter!("simbus_operator_faults_total").increment(1);
    }

    /// Total messages emitted by routing.
    pub fn messages_routed(&self) -> u64 {
        self.messages_routed.load(Ordering::Relaxed)
    }

    /// Total messages consumed without output.
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    /// Total recovered operator faults.
    pub fn operator_faults(&self) -> u64 {
        self.operator_faults.load(Ordering::Relaxed)
    }
}

/// The core-owned registry of endpoints, filters, and their chains.
#[derive(Debug)]
pub struct FilterRegistry {
    core_id: GlobalBrokerId,
    next_handle: AtomicU32,
    next_filter_id: AtomicU32,
    endpoints: DashMap<String, Arc<EndpointEntry>>,
    endpoints_by_handle: DashMap<Handle, Arc<EndpointEntry>>,
    filters: DashMap<Handle, Arc<FilterRecord>>,
    filters_by_name: DashMap<String, Handle>,
    filters_by_id: DashMap<FilterId, Handle>,
    /// Target name -> filters waiting for that endpoint, in registration
    /// order. Also serializes the endpoint-lookup/defer decision against
    /// endpoint registration.
    pending: Mutex<HashMap<String, Vec<Handle>>>,
    retired: DeferredRetirer<FilterRecord>,
    metrics: RegistryMetrics,
}

impl FilterRegistry {
    /// Creates a registry owned by the given core.
    pub fn new(core_id: GlobalBrokerId) -> Self {
        Self {
            core_id,
            next_handle: AtomicU32::new(0),
            next_filter_id: AtomicU32::new(0),
            endpoints: DashMap::new(),
            endpoints_by_handle: DashMap::new(),
            filters: DashMap::new(),
            filters_by_name: DashMap::new(),
            filters_by_id: DashMap::new(),
            pending: Mutex::new(HashMap::new()),
            retired: DeferredRetirer::new(),
            metrics: RegistryMetrics::new(),
        }
    }

    /// Id of the owning core.
    pub fn core_id(&self) -> GlobalBrokerId {
        self.core_id
    }

    fn allocate_handle(&self) -> Handle {
        Handle::new(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn allocate_filter_id(&self) -> FilterId {
        FilterId::new(self.next_filter_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers an endpoint owned by `federate`. An empty name
    /// auto-generates one. Filters already declared against this name are
    /// resolved and attached in their registration order.
    pub fn register_endpoint(&self, federate: GlobalFederateId, name: &str) -> Result<Handle> {
        let handle = self.allocate_handle();
        let name = if name.is_empty() {
            format!("ept_{}", handle.raw())
        } else {
            name.to_string()
        };
        let entry = Arc::new(EndpointEntry::new(handle, federate, name.clone()));
        match self.endpoints.entry(name.clone()) {
            Entry::Occupied(_) => {
                return Err(RegistryError::DuplicateEndpoint { name }.into());
            }
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
            }
        }
        self.endpoints_by_handle.insert(handle, entry.clone());

        // attach filters that were waiting for this endpoint name
        let waiting = self.pending.lock().remove(&name);
        if let Some(handles) = waiting {
            for filter_handle in handles {
                if let Some(record) = self.filters.get(&filter_handle).map(|r| r.value().clone()) {
                    record.resolve(federate, handle);
                    let side = if record.is_dest_filter() {
                        FilterSide::Destination
                    } else {
                        FilterSide::Source
                    };
                    debug!(
                        filter = %record.name(),
                        endpoint = %name,
                        "filter target resolved"
                    );
                    entry.chain(side).records.write().push(record);
                }
            }
        }

        debug!(endpoint = %name, handle = %handle, federate = %federate, "endpoint registered");
        Ok(handle)
    }

    /// Registers a filter. The declared target endpoint may be unknown;
    /// the record then stays unresolved (and inert) until an endpoint of
    /// that name registers.
    pub fn register_filter(&self, spec: FilterSpec) -> Result<FilterRegistration> {
        if spec.target.is_empty() {
            return Err(
                ConfigError::invalid_def(&spec.name, "a target endpoint name is required").into(),
            );
        }
        let handle = self.allocate_handle();
        let id = self.allocate_filter_id();
        let name = if spec.name.is_empty() {
            let prefix = if spec.cloning {
                "cFilter"
            } else if spec.side == FilterSide::Destination {
                "dFilter"
            } else {
                "sFilter"
            };
            format!("{}_{}", prefix, handle.raw())
        } else {
            spec.name.clone()
        };
        match self.filters_by_name.entry(name.clone()) {
            Entry::Occupied(_) => {
                return Err(ConfigError::DuplicateFilterName { name }.into());
            }
            Entry::Vacant(slot) => {
                slot.insert(handle);
            }
        }

        let record = Arc::new(FilterRecord::new(
            self.core_id,
            handle,
            name,
            spec.target.clone(),
            spec.input_type,
            spec.output_type,
            spec.side == FilterSide::Destination,
            spec.cloning,
        ));
        self.filters.insert(handle, record.clone());
        self.filters_by_id.insert(id, handle);

        {
            // the pending lock serializes this lookup against
            // register_endpoint's drain of the pending list
            let mut pending = self.pending.lock();
            match self.endpoints.get(&spec.target).map(|e| e.value().clone()) {
                Some(entry) => {
                    record.resolve(entry.federate, entry.handle);
                    entry.chain(spec.side).records.write().push(record.clone());
                }
                None => {
                    pending.entry(spec.target.clone()).or_default().push(handle);
                }
            }
        }

        debug!(
            filter = %record.name(),
            handle = %handle,
            target = %spec.target,
            cloning = spec.cloning,
            "filter registered"
        );
        Ok(FilterRegistration { handle, id })
    }

    /// Rebinds the operator of the filter at `handle`.
    pub fn set_operator(&self, handle: Handle, op: Arc<dyn FilterOperator>) -> Result<()> {
        let record = self
            .filters
            .get(&handle)
            .map(|r| r.value().clone())
            .ok_or(RegistryError::UnknownHandle { handle })?;
        record.bind_operator(op);
        debug!(filter = %record.name(), handle = %handle, "filter operator rebound");
        Ok(())
    }

    /// The operator currently bound to the filter at `handle`.
    pub fn operator_of(&self, handle: Handle) -> Result<Option<Arc<dyn FilterOperator>>> {
        self.filters
            .get(&handle)
            .map(|r| r.value().operator())
            .ok_or_else(|| RegistryError::UnknownHandle { handle }.into())
    }

    /// The routing record at `handle`.
    pub fn filter_record(&self, handle: Handle) -> Option<Arc<FilterRecord>> {
        self.filters.get(&handle).map(|r| r.value().clone())
    }

    /// Looks up a filter's routing record by federate-facing id.
    pub fn filter_record_by_id(&self, id: FilterId) -> Option<Arc<FilterRecord>> {
        let handle = *self.filters_by_id.get(&id)?.value();
        self.filter_record(handle)
    }

    /// Looks up a filter handle by name.
    pub fn filter_handle_by_name(&self, name: &str) -> Option<Handle> {
        self.filters_by_name.get(name).map(|h| *h.value())
    }

    /// Looks up an endpoint handle by name.
    pub fn endpoint_handle(&self, name: &str) -> Option<Handle> {
        self.endpoints.get(name).map(|e| e.value().handle)
    }

    /// Number of registered endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Number of live filter registrations.
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Routing counters.
    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    /// Routes a message leaving its source endpoint through that
    /// endpoint's source chain.
    pub fn route_send(&self, msg: Message) -> Result<Vec<Message>> {
        let entry = self
            .endpoints
            .get(&msg.source)
            .map(|e| e.value().clone())
            .ok_or_else(|| RegistryError::UnknownEndpoint {
                name: msg.source.clone(),
            })?;
        Ok(self.route_chain(&entry, FilterSide::Source, msg))
    }

    /// Routes a message arriving at its destination endpoint through that
    /// endpoint's destination chain.
    pub fn route_receive(&self, msg: Message) -> Result<Vec<Message>> {
        let entry = self
            .endpoints
            .get(&msg.dest)
            .map(|e| e.value().clone())
            .ok_or_else(|| RegistryError::UnknownEndpoint {
                name: msg.dest.clone(),
            })?;
        Ok(self.route_chain(&entry, FilterSide::Destination, msg))
    }

    /// Routes at an explicit endpoint handle. Calling this with a handle
    /// the registry never issued is a programming-contract violation.
    pub fn route_at(&self, handle: Handle, side: FilterSide, msg: Message) -> Result<Vec<Message>> {
        match self
            .endpoints_by_handle
            .get(&handle)
            .map(|e| e.value().clone())
        {
            Some(entry) => Ok(self.route_chain(&entry, side, msg)),
            None => {
                debug_assert!(false, "routing at unknown handle {handle}");
                error!(handle = %handle, "routing requested at unknown handle");
                Err(RegistryError::UnknownHandle { handle }.into())
            }
        }
    }

    fn route_chain(&self, entry: &EndpointEntry, side: FilterSide, msg: Message) -> Vec<Message> {
        let chain = entry.chain(side);
        let records: Vec<Arc<FilterRecord>> = chain.records.read().clone();
        if records.is_empty() {
            self.metrics.record_routed(1);
            return vec![msg];
        }

        // FIFO per handle: one endpoint's chain executes serially, other
        // endpoints are untouched. Transforms run outside registry locks.
        let _seq = chain.seq.lock();
        let mut current = vec![msg];
        let mut cloned_out: Vec<Message> = Vec::new();
        for record in &records {
            if current.is_empty() {
                trace!(endpoint = %entry.name, filter = %record.name(), "chain short-circuited");
                break;
            }
            let Some(op) = record.operator() else {
                // unbound records are inert
                continue;
            };
            if record.is_cloning() {
                for m in &current {
                    let outs = self.apply(record, &op, m.clone(), true);
                    cloned_out.extend(outs.into_iter().skip(1));
                }
            } else {
                let mut next = Vec::new();
                for m in current {
                    next.extend(self.apply(record, &op, m, false));
                }
                current = next;
            }
        }
        current.extend(cloned_out);
        self.metrics.record_routed(current.len());
        trace!(endpoint = %entry.name, outputs = current.len(), "message routed");
        current
    }

    /// Invokes one operator with the fault policy of the routing path: on
    /// an operator error or panic the untouched input passes through and
    /// the fault is reported, so a message is never half-transformed.
    fn apply(
        &self,
        record: &FilterRecord,
        op: &Arc<dyn FilterOperator>,
        msg: Message,
        cloning: bool,
    ) -> Vec<Message> {
        let fallback = msg.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| op.process(msg))) {
            Ok(Ok(outs)) => {
                record.record_stats(|s| {
                    s.processed += 1;
                    if cloning {
                        s.cloned += outs.len().saturating_sub(1) as u64;
                    } else if outs.is_empty() {
                        s.dropped += 1;
                    }
                });
                if outs.is_empty() {
                    self.metrics.record_dropped();
                }
                outs
            }
            Ok(Err(err)) => {
                error!(
                    filter = %record.name(),
                    error = %err,
                    "filter operator fault; message passes through unmodified"
                );
                record.record_stats(|s| {
                    s.processed += 1;
                    s.faults += 1;
                });
                self.metrics.record_fault();
                vec![fallback]
            }
            Err(_) => {
                error!(
                    filter = %record.name(),
                    "filter operator panicked; message passes through unmodified"
                );
                record.record_stats(|s| {
                    s.processed += 1;
                    s.faults += 1;
                });
                self.metrics.record_fault();
                vec![fallback]
            }
        }
    }

    /// Removes a filter registration. The record is detached from its
    /// chains and parked in the deferred retirer; a routing call that
    /// already snapshotted it completes against the live record.
    pub fn remove_filter(&self, handle: Handle) -> Result<()> {
        let Some((_, record)) = self.filters.remove(&handle) else {
            return Err(RegistryError::UnknownHandle { handle }.into());
        };
        self.filters_by_name.remove(record.name());
        self.filters_by_id.retain(|_, h| *h != handle);
        if let Some(entry) = self
            .endpoints
            .get(record.target())
            .map(|e| e.value().clone())
        {
            let side = if record.is_dest_filter() {
                FilterSide::Destination
            } else {
                FilterSide::Source
            };
            entry
                .chain(side)
                .records
                .write()
                .retain(|r| r.handle() != handle);
        }
        if let Some(waiting) = self.pending.lock().get_mut(record.target()) {
            waiting.retain(|h| *h != handle);
        }
        debug!(filter = %record.name(), handle = %handle, "filter removed");
        self.retired.schedule(record);
        Ok(())
    }

    /// Releases retired records that have quiesced. Returns how many were
    /// released.
    pub fn drain_retired(&self) -> usize {
        self.retired.drain()
    }

    /// Number of retired records still awaiting quiescence.
    pub fn pending_retired(&self) -> usize {
        self.retired.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{CustomOperator, DelayOperator};
    use simbus_core::SimTime;

    fn registry() -> FilterRegistry {
        FilterRegistry::new(GlobalBrokerId::new(0))
    }

    fn fed() -> GlobalFederateId {
        GlobalFederateId::new(1)
    }

    #[test]
    fn test_registration_round_trip() {
        let reg = registry();
        reg.register_endpoint(fed(), "ept_a").unwrap();
        let r = reg
            .register_filter(
                FilterSpec::source("ept_a")
                    .with_name("flt")
                    .with_types("raw", "raw"),
            )
            .unwrap();
        let record = reg.filter_record(r.handle).unwrap();
        assert_eq!(record.name(), "flt");
        assert_eq!(record.target(), "ept_a");
        assert_eq!(record.input_type(), "raw");
        assert_eq!(record.output_type(), "raw");
        assert!(record.resolution().is_resolved());
        assert_eq!(reg.filter_handle_by_name("flt"), Some(r.handle));
        assert_eq!(reg.filter_record_by_id(r.id).unwrap().handle(), r.handle);
    }

    #[test]
    fn test_auto_generated_names() {
        let reg = registry();
        let ept = reg.register_endpoint(fed(), "").unwrap();
        assert_eq!(
            reg.endpoint_handle(&format!("ept_{}", ept.raw())),
            Some(ept)
        );
        let s = reg.register_filter(FilterSpec::source("ept_x")).unwrap();
        assert!(reg
            .filter_record(s.handle)
            .unwrap()
            .name()
            .starts_with("sFilter_"));
        let d = reg
            .register_filter(FilterSpec::destination("ept_x"))
            .unwrap();
        assert!(reg
            .filter_record(d.handle)
            .unwrap()
            .name()
            .starts_with("dFilter_"));
        let c = reg
            .register_filter(FilterSpec::source("ept_x").cloning())
            .unwrap();
        assert!(reg
            .filter_record(c.handle)
            .unwrap()
            .name()
            .starts_with("cFilter_"));
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let reg = registry();
        reg.register_endpoint(fed(), "ept_a").unwrap();
        assert!(reg.register_endpoint(fed(), "ept_a").is_err());
    }

    #[test]
    fn test_filter_requires_target() {
        let reg = registry();
        assert!(reg.register_filter(FilterSpec::source("")).is_err());
    }

    #[test]
    fn test_lazy_resolution_on_endpoint_registration() {
        let reg = registry();
        let r = reg
            .register_filter(FilterSpec::source("ept_late").with_name("early"))
            .unwrap();
        assert!(!reg.filter_record(r.handle).unwrap().resolution().is_resolved());

        let ept = reg.register_endpoint(fed(), "ept_late").unwrap();
        match reg.filter_record(r.handle).unwrap().resolution() {
            TargetResolution::Resolved { federate, handle } => {
                assert_eq!(federate, fed());
                assert_eq!(handle, ept);
            }
            TargetResolution::Unresolved => panic!("expected resolution"),
        }

        // the attached filter now participates in routing
        reg.set_operator(
            r.handle,
            Arc::new(DelayOperator::new(SimTime::from_secs_f64(1.0)).unwrap()),
        )
        .unwrap();
        let out = reg
            .route_send(Message::new("ept_late", "elsewhere", "x", SimTime::ZERO))
            .unwrap();
        assert_eq!(out[0].time, SimTime::from_secs_f64(1.0));
    }

    #[test]
    fn test_route_send_without_filters_passes_through() {
        let reg = registry();
        reg.register_endpoint(fed(), "ept_a").unwrap();
        let msg = Message::new("ept_a", "ept_b", "x", SimTime::ZERO);
        let out = reg.route_send(msg.clone()).unwrap();
        assert_eq!(out, vec![msg]);
    }

    #[test]
    fn test_route_send_unknown_endpoint_errors() {
        let reg = registry();
        let msg = Message::new("nobody", "ept_b", "x", SimTime::ZERO);
        assert!(reg.route_send(msg).is_err());
    }

    #[test]
    fn test_unbound_filter_is_inert() {
        let reg = registry();
        reg.register_endpoint(fed(), "ept_a").unwrap();
        reg.register_filter(FilterSpec::source("ept_a")).unwrap();
        let msg = Message::new("ept_a", "ept_b", "x", SimTime::ZERO);
        let out = reg.route_send(msg.clone()).unwrap();
        assert_eq!(out, vec![msg]);
    }

    #[test]
    fn test_operator_fault_passes_message_through() {
        let reg = registry();
        reg.register_endpoint(fed(), "ept_a").unwrap();
        let r = reg.register_filter(FilterSpec::source("ept_a")).unwrap();
        reg.set_operator(
            r.handle,
            Arc::new(CustomOperator::new(|_msg| {
                Err(simbus_core::OperatorError::failed("intentional"))
            })),
        )
        .unwrap();
        let msg = Message::new("ept_a", "ept_b", "x", SimTime::ZERO);
        let out = reg.route_send(msg.clone()).unwrap();
        assert_eq!(out, vec![msg]);
        let stats = reg.filter_record(r.handle).unwrap().stats();
        assert_eq!(stats.faults, 1);
        assert_eq!(reg.metrics().operator_faults(), 1);
    }

    #[test]
    fn test_operator_panic_passes_message_through() {
        let reg = registry();
        reg.register_endpoint(fed(), "ept_a").unwrap();
        let r = reg.register_filter(FilterSpec::source("ept_a")).unwrap();
        reg.set_operator(
            r.handle,
            Arc::new(CustomOperator::new(|_msg| panic!("intentional"))),
        )
        .unwrap();
        let msg = Message::new("ept_a", "ept_b", "x", SimTime::ZERO);
        let out = reg.route_send(msg.clone()).unwrap();
        assert_eq!(out, vec![msg]);
    }

    #[test]
    fn test_destination_chain_routes_on_receive() {
        let reg = registry();
        reg.register_endpoint(fed(), "ept_b").unwrap();
        let r = reg
            .register_filter(FilterSpec::destination("ept_b"))
            .unwrap();
        reg.set_operator(
            r.handle,
            Arc::new(DelayOperator::new(SimTime::from_secs_f64(2.0)).unwrap()),
        )
        .unwrap();
        let out = reg
            .route_receive(Message::new("elsewhere", "ept_b", "x", SimTime::ZERO))
            .unwrap();
        assert_eq!(out[0].time, SimTime::from_secs_f64(2.0));
    }

    #[test]
    fn test_route_at_unknown_handle_is_contract_violation() {
        let reg = registry();
        let msg = Message::new("a", "b", "x", SimTime::ZERO);
        let bogus = Handle::new(999);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            reg.route_at(bogus, FilterSide::Source, msg)
        }));
        if cfg!(debug_assertions) {
            assert!(result.is_err());
        } else {
            assert!(result.unwrap().is_err());
        }
    }

    #[test]
    fn test_remove_filter_detaches_and_defers() {
        let reg = registry();
        reg.register_endpoint(fed(), "ept_a").unwrap();
        let r = reg
            .register_filter(FilterSpec::source("ept_a").with_name("gone"))
            .unwrap();
        reg.set_operator(
            r.handle,
            Arc::new(DelayOperator::new(SimTime::from_secs_f64(5.0)).unwrap()),
        )
        .unwrap();
        reg.remove_filter(r.handle).unwrap();
        assert_eq!(reg.filter_count(), 0);
        assert_eq!(reg.filter_handle_by_name("gone"), None);

        // removed filter no longer participates
        let out = reg
            .route_send(Message::new("ept_a", "ept_b", "x", SimTime::ZERO))
            .unwrap();
        assert_eq!(out[0].time, SimTime::ZERO);

        assert_eq!(reg.pending_retired(), 1);
        assert_eq!(reg.drain_retired(), 1);
        assert!(reg.remove_filter(r.handle).is_err());
    }
}
