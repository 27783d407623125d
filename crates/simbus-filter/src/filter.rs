//! User-facing filter handles and factories.
//!
//! A handle is a *view* onto the core's routing record: dropping it does
//! not deregister the filter, which keeps operating for the remainder of
//! the simulation. Accessors read through to the registry's authoritative
//! record rather than a locally cached copy, so an auto-generated name is
//! visible through any handle.

use crate::kind::FilterKind;
use crate::ops::{default_operator, CloneOperator, FilterOperator};
use crate::record::{FilterRecord, FilterStats};
use crate::registry::{FilterRegistry, FilterSpec};
use parking_lot::RwLock;
use simbus_core::error::{BusError, OperatorError, Result};
use simbus_core::{FilterId, Handle};
use std::sync::Arc;
use tracing::debug;

/// The capability surface shared by every filter variant.
pub trait FilterView {
    /// The filter's name, read from the core's record.
    fn get_name(&self) -> String;

    /// The declared target endpoint name. Empty for cloning filters,
    /// which watch a set of endpoints instead of a single target.
    fn get_target(&self) -> String;

    /// Declared input type tag.
    fn get_input_type(&self) -> String;

    /// Declared output type tag.
    fn get_output_type(&self) -> String;

    /// Federate-facing filter identifier.
    fn filter_id(&self) -> FilterId;

    /// Rebinds the filter's operator. In-flight transforms complete
    /// against the previous operator.
    fn set_operator(&self, op: Arc<dyn FilterOperator>) -> Result<()>;

    /// Sets a numeric property on the bound operator.
    fn set(&self, property: &str, value: f64) -> Result<()>;

    /// Sets a string property on the bound operator.
    fn set_string(&self, property: &str, value: &str) -> Result<()>;
}

/// Shared state of the single-record variants.
#[derive(Debug, Clone)]
struct InterfaceRef {
    registry: Arc<FilterRegistry>,
    record: Arc<FilterRecord>,
    id: FilterId,
}

impl InterfaceRef {
    fn create(registry: &Arc<FilterRegistry>, spec: FilterSpec) -> Result<Self> {
        let registration = registry.register_filter(spec)?;
        let record = registry
            .filter_record(registration.handle)
            .ok_or_else(|| BusError::Internal("record vanished after registration".to_string()))?;
        Ok(Self {
            registry: registry.clone(),
            record,
            id: registration.id,
        })
    }

    fn set_operator(&self, op: Arc<dyn FilterOperator>) -> Result<()> {
        self.registry.set_operator(self.record.handle(), op)
    }

    fn set(&self, property: &str, value: f64) -> Result<()> {
        match self.record.operator() {
            Some(op) => op.set_property(property, value).map_err(Into::into),
            None => Err(OperatorError::NoOperator.into()),
        }
    }

    fn set_string(&self, property: &str, value: &str) -> Result<()> {
        match self.record.operator() {
            Some(op) => op.set_string_property(property, value).map_err(Into::into),
            None => Err(OperatorError::NoOperator.into()),
        }
    }
}

macro_rules! delegate_view {
    () => {
        fn get_name(&self) -> String {
            self.inner.record.name().to_string()
        }

        fn get_target(&self) -> String {
            self.inner.record.target().to_string()
        }

        fn get_input_type(&self) -> String {
            self.inner.record.input_type().to_string()
        }

        fn get_output_type(&self) -> String {
            self.inner.record.output_type().to_string()
        }

        fn filter_id(&self) -> FilterId {
            self.inner.id
        }

        fn set_operator(&self, op: Arc<dyn FilterOperator>) -> Result<()> {
            self.inner.set_operator(op)
        }

        fn set(&self, property: &str, value: f64) -> Result<()> {
            self.inner.set(property, value)
        }

        fn set_string(&self, property: &str, value: &str) -> Result<()> {
            self.inner.set_string(property, value)
        }
    };
}

/// A filter intercepting messages as they leave its target endpoint.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    inner: InterfaceRef,
}

impl SourceFilter {
    /// Registers a new source filter against `target`. No operator is
    /// bound yet; the filter is inert until one is set. The target
    /// endpoint need not exist — resolution happens when it registers.
    pub fn create(
        registry: &Arc<FilterRegistry>,
        target: &str,
        name: &str,
        input_type: &str,
        output_type: &str,
    ) -> Result<Self> {
        let inner = InterfaceRef::create(
            registry,
            FilterSpec::source(target)
                .with_name(name)
                .with_types(input_type, output_type),
        )?;
        Ok(Self { inner })
    }

    /// The filter's core handle.
    pub fn handle(&self) -> Handle {
        self.inner.record.handle()
    }

    /// Snapshot of the filter's routing statistics.
    pub fn stats(&self) -> FilterStats {
        self.inner.record.stats()
    }
}

impl FilterView for SourceFilter {
    delegate_view!();
}

/// A filter intercepting messages as they arrive at its target endpoint.
#[derive(Debug, Clone)]
pub struct DestinationFilter {
    inner: InterfaceRef,
}

impl DestinationFilter {
    /// Registers a new destination filter against `target`. No operator
    /// is bound yet.
    pub fn create(
        registry: &Arc<FilterRegistry>,
        target: &str,
        name: &str,
        input_type: &str,
        output_type: &str,
    ) -> Result<Self> {
        let inner = InterfaceRef::create(
            registry,
            FilterSpec::destination(target)
                .with_name(name)
                .with_types(input_type, output_type),
        )?;
        Ok(Self { inner })
    }

    /// The filter's core handle.
    pub fn handle(&self) -> Handle {
        self.inner.record.handle()
    }

    /// Snapshot of the filter's routing statistics.
    pub fn stats(&self) -> FilterStats {
        self.inner.record.stats()
    }
}

impl FilterView for DestinationFilter {
    delegate_view!();
}

#[derive(Debug, Clone)]
struct Watch {
    endpoint: String,
    id: FilterId,
    handle: Handle,
}

/// A filter that duplicates matching messages to a delivery set without
/// suppressing the originals.
///
/// Each watched endpoint gets its own underlying cloning registration in
/// the core; all of them share one clone operator, which in turn shares
/// the delivery set owned here. Watch and delivery mutations are
/// idempotent.
#[derive(Debug)]
pub struct CloningFilter {
    registry: Arc<FilterRegistry>,
    id: FilterId,
    name: String,
    deliver_to: Arc<RwLock<Vec<String>>>,
    operator: RwLock<Arc<dyn FilterOperator>>,
    source_watches: RwLock<Vec<Watch>>,
    dest_watches: RwLock<Vec<Watch>>,
}

impl CloningFilter {
    /// Creates a cloning filter. It watches nothing until targets are
    /// added.
    pub fn create(registry: &Arc<FilterRegistry>, name: &str) -> Result<Self> {
        let id = registry.allocate_filter_id();
        let name = if name.is_empty() {
            format!("cloner_{}", id.raw())
        } else {
            name.to_string()
        };
        let deliver_to = Arc::new(RwLock::new(Vec::new()));
        let operator: Arc<dyn FilterOperator> = Arc::new(CloneOperator::new(deliver_to.clone()));
        debug!(filter = %name, "cloning filter created");
        Ok(Self {
            registry: registry.clone(),
            id,
            name,
            deliver_to,
            operator: RwLock::new(operator),
            source_watches: RwLock::new(Vec::new()),
            dest_watches: RwLock::new(Vec::new()),
        })
    }

    fn add_watch(&self, watches: &RwLock<Vec<Watch>>, endpoint: &str, dest: bool) -> Result<()> {
        let mut watches = watches.write();
        if watches.iter().any(|w| w.endpoint == endpoint) {
            return Ok(());
        }
        let spec = if dest {
            FilterSpec::destination(endpoint).cloning()
        } else {
            FilterSpec::source(endpoint).cloning()
        };
        let registration = self.registry.register_filter(spec)?;
        self.registry
            .set_operator(registration.handle, self.operator.read().clone())?;
        watches.push(Watch {
            endpoint: endpoint.to_string(),
            id: registration.id,
            handle: registration.handle,
        });
        Ok(())
    }

    fn remove_watch(&self, watches: &RwLock<Vec<Watch>>, endpoint: &str) -> Result<()> {
        let mut watches = watches.write();
        let Some(pos) = watches.iter().position(|w| w.endpoint == endpoint) else {
            return Ok(());
        };
        let watch = watches.remove(pos);
        self.registry.remove_filter(watch.handle)
    }

    /// Starts cloning messages sent *from* `endpoint`.
    pub fn add_source_target(&self, endpoint: &str) -> Result<()> {
        self.add_watch(&self.source_watches, endpoint, false)
    }

    /// Starts cloning messages delivered *to* `endpoint`.
    pub fn add_destination_target(&self, endpoint: &str) -> Result<()> {
        self.add_watch(&self.dest_watches, endpoint, true)
    }

    /// Stops watching `endpoint` as a source.
    pub fn remove_source_target(&self, endpoint: &str) -> Result<()> {
        self.remove_watch(&self.source_watches, endpoint)
    }

    /// Stops watching `endpoint` as a destination.
    pub fn remove_destination_target(&self, endpoint: &str) -> Result<()> {
        self.remove_watch(&self.dest_watches, endpoint)
    }

    /// Adds an endpoint to the delivery set clones are sent to.
    pub fn add_delivery_endpoint(&self, endpoint: &str) {
        let mut deliver_to = self.deliver_to.write();
        if !deliver_to.iter().any(|e| e == endpoint) {
            deliver_to.push(endpoint.to_string());
        }
    }

    /// Removes an endpoint from the delivery set.
    pub fn remove_delivery_endpoint(&self, endpoint: &str) {
        self.deliver_to.write().retain(|e| e != endpoint);
    }

    /// Names of the watched source endpoints.
    pub fn source_targets(&self) -> Vec<String> {
        self.source_watches
            .read()
            .iter()
            .map(|w| w.endpoint.clone())
            .collect()
    }

    /// Names of the watched destination endpoints.
    pub fn destination_targets(&self) -> Vec<String> {
        self.dest_watches
            .read()
            .iter()
            .map(|w| w.endpoint.clone())
            .collect()
    }

    /// The delivery set clones are addressed to.
    pub fn delivery_endpoints(&self) -> Vec<String> {
        self.deliver_to.read().clone()
    }

    /// Filter ids of the underlying per-watch registrations.
    pub fn watch_filter_ids(&self) -> Vec<FilterId> {
        self.source_watches
            .read()
            .iter()
            .chain(self.dest_watches.read().iter())
            .map(|w| w.id)
            .collect()
    }
}

impl FilterView for CloningFilter {
    fn get_name(&self) -> String {
        self.name.clone()
    }

    fn get_target(&self) -> String {
        String::new()
    }

    fn get_input_type(&self) -> String {
        String::new()
    }

    fn get_output_type(&self) -> String {
        String::new()
    }

    fn filter_id(&self) -> FilterId {
        self.id
    }

    fn set_operator(&self, op: Arc<dyn FilterOperator>) -> Result<()> {
        *self.operator.write() = op.clone();
        for watch in self
            .source_watches
            .read()
            .iter()
            .chain(self.dest_watches.read().iter())
        {
            self.registry.set_operator(watch.handle, op.clone())?;
        }
        Ok(())
    }

    fn set(&self, property: &str, value: f64) -> Result<()> {
        self.operator
            .read()
            .set_property(property, value)
            .map_err(Into::into)
    }

    /// `"source"`, `"destination"` and `"endpoint"` mutate the watch and
    /// delivery sets; anything else forwards to the operator.
    fn set_string(&self, property: &str, value: &str) -> Result<()> {
        match property.to_ascii_lowercase().as_str() {
            "source" => self.add_source_target(value),
            "destination" | "dest" => self.add_destination_target(value),
            "endpoint" | "delivery" => {
                self.add_delivery_endpoint(value);
                Ok(())
            }
            _ => self
                .operator
                .read()
                .set_string_property(property, value)
                .map_err(Into::into),
        }
    }
}

/// The closed set of filter variants, as produced by configuration
/// loading.
#[derive(Debug)]
pub enum AnyFilter {
    Source(SourceFilter),
    Destination(DestinationFilter),
    Cloning(CloningFilter),
}

impl FilterView for AnyFilter {
    fn get_name(&self) -> String {
        match self {
            AnyFilter::Source(f) => f.get_name(),
            AnyFilter::Destination(f) => f.get_name(),
            AnyFilter::Cloning(f) => f.get_name(),
        }
    }

    fn get_target(&self) -> String {
        match self {
            AnyFilter::Source(f) => f.get_target(),
            AnyFilter::Destination(f) => f.get_target(),
            AnyFilter::Cloning(f) => f.get_target(),
        }
    }

    fn get_input_type(&self) -> String {
        match self {
            AnyFilter::Source(f) => f.get_input_type(),
            AnyFilter::Destination(f) => f.get_input_type(),
            AnyFilter::Cloning(f) => f.get_input_type(),
        }
    }

    fn get_output_type(&self) -> String {
        match self {
            AnyFilter::Source(f) => f.get_output_type(),
            AnyFilter::Destination(f) => f.get_output_type(),
            AnyFilter::Cloning(f) => f.get_output_type(),
        }
    }

    fn filter_id(&self) -> FilterId {
        match self {
            AnyFilter::Source(f) => f.filter_id(),
            AnyFilter::Destination(f) => f.filter_id(),
            AnyFilter::Cloning(f) => f.filter_id(),
        }
    }

    fn set_operator(&self, op: Arc<dyn FilterOperator>) -> Result<()> {
        match self {
            AnyFilter::Source(f) => f.set_operator(op),
            AnyFilter::Destination(f) => f.set_operator(op),
            AnyFilter::Cloning(f) => f.set_operator(op),
        }
    }

    fn set(&self, property: &str, value: f64) -> Result<()> {
        match self {
            AnyFilter::Source(f) => f.set(property, value),
            AnyFilter::Destination(f) => f.set(property, value),
            AnyFilter::Cloning(f) => f.set(property, value),
        }
    }

    fn set_string(&self, property: &str, value: &str) -> Result<()> {
        match self {
            AnyFilter::Source(f) => f.set_string(property, value),
            AnyFilter::Destination(f) => f.set_string(property, value),
            AnyFilter::Cloning(f) => f.set_string(property, value),
        }
    }
}

/// Creates a source filter of the given kind against `target`, with the
/// kind's default-configured operator bound (none for `Custom`).
pub fn make_source_filter(
    kind: FilterKind,
    registry: &Arc<FilterRegistry>,
    target: &str,
    name: &str,
) -> Result<SourceFilter> {
    let filter = SourceFilter::create(registry, target, name, "", "")?;
    if let Some(op) = default_operator(kind)? {
        filter.set_operator(op)?;
    }
    Ok(filter)
}

/// Creates a destination filter of the given kind against `target`.
pub fn make_destination_filter(
    kind: FilterKind,
    registry: &Arc<FilterRegistry>,
    target: &str,
    name: &str,
) -> Result<DestinationFilter> {
    let filter = DestinationFilter::create(registry, target, name, "", "")?;
    if let Some(op) = default_operator(kind)? {
        filter.set_operator(op)?;
    }
    Ok(filter)
}

/// Creates a cloning filter. Watches and the delivery set start empty.
pub fn make_cloning_filter(registry: &Arc<FilterRegistry>, name: &str) -> Result<CloningFilter> {
    CloningFilter::create(registry, name)
}
