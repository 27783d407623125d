//! Filter operators: the transforms bound to routing records.
//!
//! An operator consumes one message and yields zero, one, or many outgoing
//! messages. Operators are shared as `Arc<dyn FilterOperator>` between the
//! registry, user-facing handles, and (for cloning filters) many routing
//! records at once, so parameter state lives behind locks and every method
//! takes `&self`. Rebinding a record's operator swaps the `Arc`; a transform
//! already running against the old instance keeps it alive until it returns.

use crate::kind::FilterKind;
use parking_lot::RwLock;
use rand::Rng;
use rand_distr::{Distribution, Exp, Normal, Uniform};
use simbus_core::error::{ConfigError, OperatorError};
use simbus_core::{Message, SimTime};
use std::fmt;
use std::sync::Arc;

/// A unit of filter behavior.
///
/// `process` must either return the full output set or an error; it must
/// never return a partially transformed message. Property setters reject
/// unrecognized names and invalid values, leaving the operator in its prior
/// valid state.
pub trait FilterOperator: Send + Sync + fmt::Debug {
    /// Canonical operator name, used in diagnostics and property errors.
    fn name(&self) -> &'static str;

    /// Consumes a message and produces the outgoing set.
    fn process(&self, msg: Message) -> Result<Vec<Message>, OperatorError>;

    /// Sets a numeric property.
    fn set_property(&self, property: &str, value: f64) -> Result<(), ConfigError> {
        let _ = value;
        Err(ConfigError::unknown_property(self.name(), property))
    }

    /// Sets a string property.
    fn set_string_property(&self, property: &str, value: &str) -> Result<(), ConfigError> {
        let _ = value;
        Err(ConfigError::unknown_property(self.name(), property))
    }

    /// Human-readable description of the operator and its current state.
    fn describe(&self) -> String;
}

/// Normalized property-name matching: `"dropProb"`, `"drop_prob"` and
/// `"DROPPROB"` all select the same property.
fn norm(property: &str) -> String {
    property
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn require_finite(property: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid_property(property, "must be finite"))
    }
}

/// Builds the default-configured operator for a filter kind.
///
/// `Custom` yields `None`: a custom filter starts with no transform bound
/// and is inert until `set_operator` is called. `Clone` is rejected here
/// since clone operators are created by their enclosing cloning filter, and
/// `Unrecognized` always fails.
pub(crate) fn default_operator(
    kind: FilterKind,
) -> Result<Option<Arc<dyn FilterOperator>>, ConfigError> {
    match kind {
        FilterKind::Custom => Ok(None),
        FilterKind::Delay => Ok(Some(Arc::new(DelayOperator::default()))),
        FilterKind::RandomDelay => Ok(Some(Arc::new(RandomDelayOperator::default()))),
        FilterKind::RandomDrop => Ok(Some(Arc::new(RandomDropOperator::default()))),
        FilterKind::Reroute => Ok(Some(Arc::new(RerouteOperator::default()))),
        FilterKind::Clone => Err(ConfigError::invalid_def(
            kind.as_str(),
            "clone operators are owned by a cloning filter; use its factory",
        )),
        FilterKind::Unrecognized => Err(ConfigError::unrecognized(kind.as_str())),
    }
}

/// Signature of an injected custom transform.
pub type TransformFn = dyn Fn(Message) -> Result<Vec<Message>, OperatorError> + Send + Sync;

/// Operator that delegates entirely to user-supplied logic.
pub struct CustomOperator {
    transform: Arc<TransformFn>,
}

impl CustomOperator {
    /// Wraps a transform callable.
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(Message) -> Result<Vec<Message>, OperatorError> + Send + Sync + 'static,
    {
        Self {
            transform: Arc::new(transform),
        }
    }
}

impl fmt::Debug for CustomOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomOperator(<transform>)")
    }
}

impl FilterOperator for CustomOperator {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn process(&self, msg: Message) -> Result<Vec<Message>, OperatorError> {
        (self.transform)(msg)
    }

    fn describe(&self) -> String {
        "CustomOperator(<transform>)".to_string()
    }
}

/// Operator that shifts the receive time forward by a fixed delay.
#[derive(Debug, Default)]
pub struct DelayOperator {
    delay: RwLock<SimTime>,
}

impl DelayOperator {
    /// Creates a delay operator. Negative delays are rejected.
    pub fn new(delay: SimTime) -> Result<Self, ConfigError> {
        if delay.is_negative() {
            return Err(ConfigError::invalid_property(
                "delay",
                "must be non-negative",
            ));
        }
        Ok(Self {
            delay: RwLock::new(delay),
        })
    }

    /// Current configured delay.
    pub fn delay(&self) -> SimTime {
        *self.delay.read()
    }
}

impl FilterOperator for DelayOperator {
    fn name(&self) -> &'static str {
        "delay"
    }

    fn process(&self, mut msg: Message) -> Result<Vec<Message>, OperatorError> {
        msg.time = msg.time.saturating_add(*self.delay.read());
        Ok(vec![msg])
    }

    fn set_property(&self, property: &str, value: f64) -> Result<(), ConfigError> {
        match norm(property).as_str() {
            "delay" => {
                require_finite(property, value)?;
                if value < 0.0 {
                    return Err(ConfigError::invalid_property(
                        property,
                        "must be non-negative",
                    ));
                }
                *self.delay.write() = SimTime::from_secs_f64(value);
                Ok(())
            }
            _ => Err(ConfigError::unknown_property(self.name(), property)),
        }
    }

    fn describe(&self) -> String {
        format!("DelayOperator(delay: {})", self.delay())
    }
}

/// Distribution families recognized by [`RandomDelayOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DistributionFamily {
    Constant,
    Uniform,
    Exponential,
    Normal,
}

impl DistributionFamily {
    fn parse(spec: &str) -> Option<Self> {
        match norm(spec).as_str() {
            "constant" => Some(Self::Constant),
            "uniform" => Some(Self::Uniform),
            "exponential" => Some(Self::Exponential),
            "normal" | "gaussian" => Some(Self::Normal),
            _ => None,
        }
    }

    const fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Uniform => "uniform",
            Self::Exponential => "exponential",
            Self::Normal => "normal",
        }
    }
}

/// Raw distribution parameters as set through the property surface.
///
/// Only the fields relevant to the active family are validated; switching
/// family revalidates against whatever was last set.
#[derive(Debug, Clone, Copy)]
struct DelayParams {
    family: DistributionFamily,
    value: f64,
    min: f64,
    max: f64,
    mean: f64,
    stddev: f64,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            family: DistributionFamily::Constant,
            value: 0.0,
            min: 0.0,
            max: 0.0,
            mean: 1.0,
            stddev: 0.0,
        }
    }
}

/// A validated, ready-to-draw sampler.
#[derive(Debug, Clone)]
enum DelaySampler {
    Constant(f64),
    Uniform(Uniform<f64>),
    Exponential(Exp<f64>),
    Normal(Normal<f64>),
}

impl DelaySampler {
    fn build(params: &DelayParams) -> Result<Self, ConfigError> {
        match params.family {
            DistributionFamily::Constant => {
                if params.value < 0.0 {
                    return Err(ConfigError::invalid_property(
                        "value",
                        "must be non-negative",
                    ));
                }
                Ok(Self::Constant(params.value))
            }
            DistributionFamily::Uniform => {
                if params.min < 0.0 {
                    return Err(ConfigError::invalid_property("min", "must be non-negative"));
                }
                if params.min > params.max {
                    return Err(ConfigError::invalid_property(
                        "min",
                        "must not exceed max",
                    ));
                }
                Ok(Self::Uniform(Uniform::new_inclusive(
                    params.min, params.max,
                )))
            }
            DistributionFamily::Exponential => {
                if params.mean <= 0.0 {
                    return Err(ConfigError::invalid_property("mean", "must be positive"));
                }
                Exp::new(1.0 / params.mean)
                    .map(Self::Exponential)
                    .map_err(|_| ConfigError::invalid_property("mean", "must be positive"))
            }
            DistributionFamily::Normal => {
                if params.stddev < 0.0 {
                    return Err(ConfigError::invalid_property(
                        "stddev",
                        "must be non-negative",
                    ));
                }
                Normal::new(params.mean, params.stddev)
                    .map(Self::Normal)
                    .map_err(|_| {
                        ConfigError::invalid_property("stddev", "must be non-negative and finite")
                    })
            }
        }
    }

    /// Draws one delay in seconds. Negative draws (possible for normal)
    /// clamp to zero so time never moves backwards.
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::Uniform(d) => d.sample(rng),
            Self::Exponential(d) => d.sample(rng),
            Self::Normal(d) => d.sample(rng).max(0.0),
        }
    }
}

#[derive(Debug, Clone)]
struct RandomDelayState {
    params: DelayParams,
    sampler: DelaySampler,
}

/// Operator that shifts the receive time by a value drawn fresh per message
/// from a configured distribution.
#[derive(Debug)]
pub struct RandomDelayOperator {
    state: RwLock<RandomDelayState>,
}

impl Default for RandomDelayOperator {
    fn default() -> Self {
        let params = DelayParams::default();
        // default params are always valid
        let sampler = DelaySampler::Constant(0.0);
        Self {
            state: RwLock::new(RandomDelayState { params, sampler }),
        }
    }
}

impl RandomDelayOperator {
    /// Applies a parameter change: the update is validated against a copy
    /// and committed only if the resulting sampler builds.
    fn update(&self, apply: impl FnOnce(&mut DelayParams)) -> Result<(), ConfigError> {
        let mut state = self.state.write();
        let mut params = state.params;
        apply(&mut params);
        let sampler = DelaySampler::build(&params)?;
        *state = RandomDelayState { params, sampler };
        Ok(())
    }
}

impl FilterOperator for RandomDelayOperator {
    fn name(&self) -> &'static str {
        "randomDelay"
    }

    fn process(&self, mut msg: Message) -> Result<Vec<Message>, OperatorError> {
        let drawn = {
            let state = self.state.read();
            state.sampler.draw(&mut rand::thread_rng())
        };
        msg.time = msg.time.saturating_add(SimTime::from_secs_f64(drawn));
        Ok(vec![msg])
    }

    fn set_property(&self, property: &str, value: f64) -> Result<(), ConfigError> {
        require_finite(property, value)?;
        match norm(property).as_str() {
            "value" | "delay" | "param1" => self.update(|p| p.value = value),
            "min" => self.update(|p| p.min = value),
            "max" | "param2" => self.update(|p| p.max = value),
            "mean" => self.update(|p| p.mean = value),
            "stddev" | "sigma" => self.update(|p| p.stddev = value),
            _ => Err(ConfigError::unknown_property(self.name(), property)),
        }
    }

    fn set_string_property(&self, property: &str, value: &str) -> Result<(), ConfigError> {
        match norm(property).as_str() {
            "distribution" | "dist" => {
                let family = DistributionFamily::parse(value).ok_or_else(|| {
                    ConfigError::invalid_property(
                        property,
                        format!("unknown distribution family: {value}"),
                    )
                })?;
                self.update(|p| p.family = family)
            }
            _ => Err(ConfigError::unknown_property(self.name(), property)),
        }
    }

    fn describe(&self) -> String {
        let state = self.state.read();
        format!(
            "RandomDelayOperator(distribution: {})",
            state.params.family.as_str()
        )
    }
}

/// Operator that discards messages with a configured probability.
#[derive(Debug, Default)]
pub struct RandomDropOperator {
    prob: RwLock<f64>,
}

impl RandomDropOperator {
    /// Creates a drop operator. The probability must lie in [0, 1].
    pub fn new(prob: f64) -> Result<Self, ConfigError> {
        Self::validate(prob)?;
        Ok(Self {
            prob: RwLock::new(prob),
        })
    }

    fn validate(prob: f64) -> Result<(), ConfigError> {
        if !prob.is_finite() || !(0.0..=1.0).contains(&prob) {
            return Err(ConfigError::invalid_property(
                "dropProb",
                "must lie in [0, 1]",
            ));
        }
        Ok(())
    }

    /// Current drop probability.
    pub fn prob(&self) -> f64 {
        *self.prob.read()
    }
}

impl FilterOperator for RandomDropOperator {
    fn name(&self) -> &'static str {
        "randomDrop"
    }

    fn process(&self, msg: Message) -> Result<Vec<Message>, OperatorError> {
        let prob = *self.prob.read();
        if rand::thread_rng().gen::<f64>() < prob {
            Ok(Vec::new())
        } else {
            Ok(vec![msg])
        }
    }

    fn set_property(&self, property: &str, value: f64) -> Result<(), ConfigError> {
        match norm(property).as_str() {
            "dropprob" | "prob" | "probability" => {
                Self::validate(value)?;
                *self.prob.write() = value;
                Ok(())
            }
            _ => Err(ConfigError::unknown_property(self.name(), property)),
        }
    }

    fn describe(&self) -> String {
        format!("RandomDropOperator(prob: {})", self.prob())
    }
}

/// Operator that rewrites the destination endpoint.
///
/// With no target configured the operator is inert and passes messages
/// through unchanged.
#[derive(Debug, Default)]
pub struct RerouteOperator {
    target: RwLock<String>,
}

impl RerouteOperator {
    /// Creates a reroute operator addressed at `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: RwLock::new(target.into()),
        }
    }

    /// Current reroute target.
    pub fn target(&self) -> String {
        self.target.read().clone()
    }
}

impl FilterOperator for RerouteOperator {
    fn name(&self) -> &'static str {
        "reroute"
    }

    fn process(&self, mut msg: Message) -> Result<Vec<Message>, OperatorError> {
        let target = self.target.read();
        if !target.is_empty() {
            msg.dest = target.clone();
        }
        Ok(vec![msg])
    }

    fn set_string_property(&self, property: &str, value: &str) -> Result<(), ConfigError> {
        match norm(property).as_str() {
            "target" | "newdestination" => {
                if value.is_empty() {
                    return Err(ConfigError::invalid_property(
                        property,
                        "must be a non-empty endpoint name",
                    ));
                }
                *self.target.write() = value.to_string();
                Ok(())
            }
            _ => Err(ConfigError::unknown_property(self.name(), property)),
        }
    }

    fn describe(&self) -> String {
        format!("RerouteOperator(target: {})", self.target())
    }
}

/// Operator that returns the original message plus one duplicate per
/// delivery endpoint, each duplicate addressed to that endpoint.
///
/// The delivery set is owned by the enclosing cloning filter and shared
/// into the operator, so every routing record bound to the same operator
/// sees membership changes immediately.
#[derive(Debug)]
pub struct CloneOperator {
    deliver_to: Arc<RwLock<Vec<String>>>,
}

impl CloneOperator {
    /// Creates a clone operator over a shared delivery set.
    pub fn new(deliver_to: Arc<RwLock<Vec<String>>>) -> Self {
        Self { deliver_to }
    }
}

impl FilterOperator for CloneOperator {
    fn name(&self) -> &'static str {
        "clone"
    }

    fn process(&self, msg: Message) -> Result<Vec<Message>, OperatorError> {
        let deliver_to = self.deliver_to.read();
        let mut out = Vec::with_capacity(1 + deliver_to.len());
        for endpoint in deliver_to.iter() {
            out.push(msg.redirected(endpoint));
        }
        // original goes first, undisturbed
        out.insert(0, msg);
        Ok(out)
    }

    fn describe(&self) -> String {
        format!("CloneOperator(deliver_to: {:?})", *self.deliver_to.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> Message {
        Message::new("ept_a", "ept_b", "payload", SimTime::from_secs_f64(1.0))
    }

    #[test]
    fn test_delay_shifts_receive_time_only() {
        let op = DelayOperator::new(SimTime::from_secs_f64(0.5)).unwrap();
        let out = op.process(msg()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].time, SimTime::from_secs_f64(1.5));
        assert_eq!(out[0].payload, msg().payload);
        assert_eq!(out[0].dest, "ept_b");
    }

    #[test]
    fn test_delay_rejects_negative() {
        assert!(DelayOperator::new(SimTime::from_secs_f64(-1.0)).is_err());
        let op = DelayOperator::default();
        assert!(op.set_property("delay", -0.5).is_err());
        assert!(op.set_property("delay", f64::NAN).is_err());
        // rejected set leaves prior state intact
        assert_eq!(op.delay(), SimTime::ZERO);
    }

    #[test]
    fn test_delay_rejects_unknown_property() {
        let op = DelayOperator::default();
        let err = op.set_property("jitter", 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProperty { .. }));
    }

    #[test]
    fn test_random_delay_uniform_bounds() {
        let op = RandomDelayOperator::default();
        op.set_string_property("distribution", "uniform").unwrap();
        op.set_property("min", 0.1).unwrap();
        op.set_property("max", 0.2).unwrap();
        for _ in 0..200 {
            let out = op.process(msg()).unwrap();
            assert_eq!(out.len(), 1);
            let shift = out[0].time.as_secs_f64() - 1.0;
            assert!((0.1..=0.2).contains(&shift), "shift {shift} out of bounds");
        }
    }

    #[test]
    fn test_random_delay_draws_fresh_per_message() {
        let op = RandomDelayOperator::default();
        op.set_string_property("distribution", "uniform").unwrap();
        op.set_property("max", 10.0).unwrap();
        let times: Vec<_> = (0..50)
            .map(|_| op.process(msg()).unwrap()[0].time)
            .collect();
        let first = times[0];
        assert!(times.iter().any(|t| *t != first));
    }

    #[test]
    fn test_random_delay_rejects_bad_params() {
        let op = RandomDelayOperator::default();
        op.set_string_property("distribution", "uniform").unwrap();
        op.set_property("min", 0.5).unwrap();
        op.set_property("max", 1.0).unwrap();
        // min > max rejected, prior sampler kept
        assert!(op.set_property("min", 2.0).is_err());
        let out = op.process(msg()).unwrap();
        let shift = out[0].time.as_secs_f64() - 1.0;
        assert!((0.5..=1.0).contains(&shift));
    }

    #[test]
    fn test_random_delay_unknown_distribution() {
        let op = RandomDelayOperator::default();
        let err = op
            .set_string_property("distribution", "teleport")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProperty { .. }));
    }

    #[test]
    fn test_random_drop_never_and_always() {
        let never = RandomDropOperator::new(0.0).unwrap();
        for _ in 0..1000 {
            assert_eq!(never.process(msg()).unwrap().len(), 1);
        }
        let always = RandomDropOperator::new(1.0).unwrap();
        for _ in 0..1000 {
            assert!(always.process(msg()).unwrap().is_empty());
        }
    }

    #[test]
    fn test_random_drop_empirical_fraction() {
        let op = RandomDropOperator::new(0.25).unwrap();
        let trials = 10_000;
        let dropped = (0..trials)
            .filter(|_| op.process(msg()).unwrap().is_empty())
            .count();
        // expected 2500, sd ~43; +/-300 is beyond 6 sigma
        assert!(
            (2200..=2800).contains(&dropped),
            "dropped {dropped} of {trials}"
        );
    }

    #[test]
    fn test_random_drop_rejects_out_of_range() {
        assert!(RandomDropOperator::new(1.5).is_err());
        assert!(RandomDropOperator::new(-0.1).is_err());
        let op = RandomDropOperator::new(0.5).unwrap();
        assert!(op.set_property("dropProb", 2.0).is_err());
        assert_eq!(op.prob(), 0.5);
    }

    #[test]
    fn test_reroute_rewrites_destination_only() {
        let op = RerouteOperator::new("ept_c");
        let out = op.process(msg()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].dest, "ept_c");
        assert_eq!(out[0].original_dest, "ept_b");
        assert_eq!(out[0].time, SimTime::from_secs_f64(1.0));
        assert_eq!(out[0].payload, msg().payload);
    }

    #[test]
    fn test_reroute_property_aliases() {
        let op = RerouteOperator::default();
        op.set_string_property("newdestination", "ept_x").unwrap();
        assert_eq!(op.target(), "ept_x");
        op.set_string_property("target", "ept_y").unwrap();
        assert_eq!(op.target(), "ept_y");
        assert!(op.set_string_property("target", "").is_err());
    }

    #[test]
    fn test_clone_emits_original_plus_duplicates() {
        let deliver = Arc::new(RwLock::new(vec!["a".to_string(), "b".to_string()]));
        let op = CloneOperator::new(deliver);
        let out = op.process(msg()).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].dest, "ept_b");
        assert_eq!(out[1].dest, "a");
        assert_eq!(out[2].dest, "b");
        for m in &out {
            assert_eq!(m.payload, msg().payload);
            assert_eq!(m.original_dest, "ept_b");
            assert_eq!(m.time, SimTime::from_secs_f64(1.0));
        }
    }

    #[test]
    fn test_clone_sees_delivery_set_changes() {
        let deliver = Arc::new(RwLock::new(Vec::new()));
        let op = CloneOperator::new(deliver.clone());
        assert_eq!(op.process(msg()).unwrap().len(), 1);
        deliver.write().push("tap".to_string());
        assert_eq!(op.process(msg()).unwrap().len(), 2);
    }

    #[test]
    fn test_default_operator_factory() {
        assert!(default_operator(FilterKind::Custom).unwrap().is_none());
        assert!(default_operator(FilterKind::Delay).unwrap().is_some());
        assert!(default_operator(FilterKind::Unrecognized).is_err());
        assert!(default_operator(FilterKind::Clone).is_err());
    }

    #[test]
    fn test_custom_operator_delegates() {
        let op = CustomOperator::new(|mut m: Message| {
            m.dest = "rewritten".to_string();
            Ok(vec![m])
        });
        let out = op.process(msg()).unwrap();
        assert_eq!(out[0].dest, "rewritten");
        assert!(op.set_property("anything", 1.0).is_err());
    }
}
