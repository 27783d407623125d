//! Filter kind enumeration and name parsing.

use std::fmt;

/// The set of defined filter kinds.
///
/// `Unrecognized` is a real member of the set: configuration loading maps
/// unknown type tokens to it instead of failing, and the operator factory
/// rejects it when construction is actually attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// User-supplied transform, bound explicitly via `set_operator`.
    Custom,
    /// Fixed receive-time shift.
    Delay,
    /// Receive-time shift drawn per message from a configured distribution.
    RandomDelay,
    /// Probabilistic message discard.
    RandomDrop,
    /// Destination rewrite.
    Reroute,
    /// Duplication to a delivery set without disturbing the original.
    Clone,
    /// Anything that failed to parse.
    Unrecognized,
}

impl FilterKind {
    /// Parses a filter-type token.
    ///
    /// Case- and form-insensitive: `"randomDelay"`, `"random_delay"` and
    /// `"RANDOM-DELAY"` all name the same kind. Unknown tokens map to
    /// [`FilterKind::Unrecognized`]; this never fails, so configuration
    /// loading can defer the error to construction time.
    pub fn parse(spec: &str) -> FilterKind {
        let normalized: String = spec
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "custom" => FilterKind::Custom,
            "delay" => FilterKind::Delay,
            "randomdelay" => FilterKind::RandomDelay,
            "randomdrop" => FilterKind::RandomDrop,
            "reroute" | "redirect" => FilterKind::Reroute,
            "clone" | "cloning" => FilterKind::Clone,
            _ => FilterKind::Unrecognized,
        }
    }

    /// Canonical token for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Custom => "custom",
            FilterKind::Delay => "delay",
            FilterKind::RandomDelay => "randomDelay",
            FilterKind::RandomDrop => "randomDrop",
            FilterKind::Reroute => "reroute",
            FilterKind::Clone => "clone",
            FilterKind::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
