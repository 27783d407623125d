//! Error types for the SimBus filter core.
//!
//! Failures are always surfaced per call, never as a process-wide abort.
//! All errors are serializable so diagnostics can cross the API boundary.

use crate::types::Handle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`BusError`] as the error type.
pub type Result<T> = std::result::Result<T, BusError>;

/// Top-level error type for filter-core operations.
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum BusError {
    /// Configuration errors, reported synchronously at registration or
    /// property-set time.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registry and handle-resolution errors.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Runtime transform faults.
    #[error("operator error: {0}")]
    Operator(#[from] OperatorError),

    /// Internal errors that shouldn't normally occur.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised while configuring filters and operators.
///
/// A configuration error always leaves the targeted object in its prior
/// valid state.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// The filter-type token did not name a constructible operator.
    #[error("unrecognized filter type: {spec}")]
    UnrecognizedFilterType { spec: String },

    /// A property value failed validation.
    #[error("invalid value for property '{property}': {reason}")]
    InvalidProperty { property: String, reason: String },

    /// The operator does not recognize the property name.
    #[error("operator {operator} has no property '{property}'")]
    UnknownProperty { operator: String, property: String },

    /// A filter definition failed validation.
    #[error("invalid filter definition '{name}': {reason}")]
    InvalidFilterDef { name: String, reason: String },

    /// Two filter definitions share a name.
    #[error("duplicate filter name: {name}")]
    DuplicateFilterName { name: String },
}

impl ConfigError {
    /// Creates an unrecognized-filter-type error.
    pub fn unrecognized(spec: impl Into<String>) -> Self {
        Self::UnrecognizedFilterType { spec: spec.into() }
    }

    /// Creates an invalid-property error.
    pub fn invalid_property(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProperty {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unknown-property error.
    pub fn unknown_property(operator: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            operator: operator.into(),
            property: property.into(),
        }
    }

    /// Creates an invalid-filter-definition error.
    pub fn invalid_def(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilterDef {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the core registry.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum RegistryError {
    /// A lookup named a handle the registry never issued. Routing on an
    /// unknown handle is a programming-contract violation.
    #[error("unknown handle {handle}")]
    UnknownHandle { handle: Handle },

    /// The named endpoint is not registered.
    #[error("unknown endpoint: {name}")]
    UnknownEndpoint { name: String },

    /// An endpoint with that name already exists.
    #[error("endpoint name already registered: {name}")]
    DuplicateEndpoint { name: String },

    /// The handle's routing record has been retired.
    #[error("handle {handle} has been retired")]
    RetiredHandle { handle: Handle },
}

/// Runtime faults from a filter operator processing a specific message.
///
/// The registry recovers from these locally: the message passes through
/// unmodified and the fault is reported through diagnostics.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum OperatorError {
    /// The transform reported a failure.
    #[error("transform failed: {reason}")]
    TransformFailed { reason: String },

    /// The transform panicked; the payload was recovered at the routing
    /// boundary.
    #[error("transform panicked: {detail}")]
    TransformPanicked { detail: String },

    /// No operator is bound where one was required.
    #[error("no operator bound")]
    NoOperator,
}

impl OperatorError {
    /// Creates a transform-failed error.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::TransformFailed {
            reason: reason.into(),
        }
    }
}
