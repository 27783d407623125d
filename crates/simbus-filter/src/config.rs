//! Declarative filter-set configuration.
//!
//! Filter chains can be described in YAML and applied to a registry in one
//! step, so deployments can interpose filters without code changes:
//!
//! ```yaml
//! filters:
//!   - name: slow-link
//!     kind: delay
//!     side: source
//!     target: ept_alpha
//!     properties:
//!       delay: 0.5
//!   - name: audit-tap
//!     kind: clone
//!     sources: [ept_alpha]
//!     deliver_to: [audit]
//! ```

use crate::filter::{
    make_cloning_filter, make_destination_filter, make_source_filter, AnyFilter, FilterView,
};
use crate::kind::FilterKind;
use crate::registry::FilterRegistry;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One filter definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDef {
    /// Filter name; empty auto-generates one.
    #[serde(default)]
    pub name: String,
    /// Filter kind token, parsed case- and form-insensitively.
    pub kind: String,
    /// `source` or `destination`; ignored for clone filters.
    #[serde(default = "default_side")]
    pub side: String,
    /// Target endpoint name (non-clone kinds).
    #[serde(default)]
    pub target: String,
    /// Declared input type tag.
    #[serde(default)]
    pub input_type: String,
    /// Declared output type tag.
    #[serde(default)]
    pub output_type: String,
    /// Operator properties; numbers go to `set`, strings to `set_string`.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_yaml::Value>,
    /// Watched source endpoints (clone kind only).
    #[serde(default)]
    pub sources: Vec<String>,
    /// Watched destination endpoints (clone kind only).
    #[serde(default)]
    pub destinations: Vec<String>,
    /// Delivery endpoints for clones (clone kind only).
    #[serde(default)]
    pub deliver_to: Vec<String>,
    /// Whether this definition is applied.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_side() -> String {
    "source".to_string()
}

fn default_enabled() -> bool {
    true
}

impl FilterDef {
    fn parsed_kind(&self) -> FilterKind {
        FilterKind::parse(&self.kind)
    }

    fn parsed_side(&self) -> Result<bool> {
        match self.side.to_ascii_lowercase().as_str() {
            "source" | "src" => Ok(false),
            "destination" | "dest" => Ok(true),
            other => Err(anyhow!(
                "invalid side '{}' for filter '{}': must be 'source' or 'destination'",
                other,
                self.name
            )),
        }
    }

    /// Validates the definition without touching a registry.
    pub fn validate(&self) -> Result<()> {
        let kind = self.parsed_kind();
        if kind == FilterKind::Unrecognized {
            return Err(anyhow!(
                "unrecognized filter kind '{}' for filter '{}'",
                self.kind,
                self.name
            ));
        }
        if kind == FilterKind::Clone {
            if !self.target.is_empty() {
                return Err(anyhow!(
                    "clone filter '{}' takes 'sources'/'destinations', not 'target'",
                    self.name
                ));
            }
        } else {
            self.parsed_side()?;
            if self.target.is_empty() {
                return Err(anyhow!("filter '{}' requires a target endpoint", self.name));
            }
            if !self.sources.is_empty() || !self.destinations.is_empty() || !self.deliver_to.is_empty()
            {
                return Err(anyhow!(
                    "filter '{}' is not a clone filter and cannot take watch/delivery lists",
                    self.name
                ));
            }
        }
        for (key, value) in &self.properties {
            match value {
                serde_yaml::Value::Number(_) | serde_yaml::Value::String(_) => {}
                _ => {
                    return Err(anyhow!(
                        "property '{}' of filter '{}' must be a number or a string",
                        key,
                        self.name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Registers this definition against `registry`.
    pub fn apply(&self, registry: &Arc<FilterRegistry>) -> Result<AnyFilter> {
        self.validate()?;
        let kind = self.parsed_kind();
        let filter = if kind == FilterKind::Clone {
            let cloner = make_cloning_filter(registry, &self.name)
                .with_context(|| format!("creating clone filter '{}'", self.name))?;
            for endpoint in &self.sources {
                cloner.add_source_target(endpoint)?;
            }
            for endpoint in &self.destinations {
                cloner.add_destination_target(endpoint)?;
            }
            for endpoint in &self.deliver_to {
                cloner.add_delivery_endpoint(endpoint);
            }
            AnyFilter::Cloning(cloner)
        } else if self.parsed_side()? {
            AnyFilter::Destination(
                make_destination_filter(kind, registry, &self.target, &self.name)
                    .with_context(|| format!("creating filter '{}'", self.name))?,
            )
        } else {
            AnyFilter::Source(
                make_source_filter(kind, registry, &self.target, &self.name)
                    .with_context(|| format!("creating filter '{}'", self.name))?,
            )
        };

        for (key, value) in &self.properties {
            match value {
                serde_yaml::Value::Number(n) => {
                    let value = n
                        .as_f64()
                        .ok_or_else(|| anyhow!("property '{}' is not a valid number", key))?;
                    filter
                        .set(key, value)
                        .with_context(|| format!("setting property '{}' on '{}'", key, self.name))?;
                }
                serde_yaml::Value::String(s) => {
                    filter
                        .set_string(key, s)
                        .with_context(|| format!("setting property '{}' on '{}'", key, self.name))?;
                }
                _ => unreachable!("validated above"),
            }
        }
        Ok(filter)
    }
}

/// A set of filter definitions, loadable from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSetConfig {
    /// The filter definitions, applied in order.
    #[serde(default)]
    pub filters: Vec<FilterDef>,
}

impl FilterSetConfig {
    /// Loads a filter-set configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FilterSetConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        info!(
            path = %path.display(),
            filter_count = config.filters.len(),
            "Loaded filter configuration"
        );

        Ok(config)
    }

    /// Saves the configuration to a YAML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Saved filter configuration");

        Ok(())
    }

    /// Validates every definition and checks for duplicate names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for def in &self.filters {
            if !def.name.is_empty() && !seen.insert(&def.name) {
                return Err(anyhow!("duplicate filter name: {}", def.name));
            }
            def.validate()?;
        }
        Ok(())
    }

    /// Applies every enabled definition to `registry`, returning the
    /// constructed filter handles in definition order.
    pub fn apply(&self, registry: &Arc<FilterRegistry>) -> Result<Vec<AnyFilter>> {
        let mut applied = Vec::with_capacity(self.filters.len());
        for def in &self.filters {
            if !def.enabled {
                info!(filter = %def.name, "Skipping disabled filter");
                continue;
            }
            applied.push(def.apply(registry)?);
        }
        Ok(applied)
    }

    /// An example configuration exercising the built-in kinds.
    pub fn example() -> Self {
        FilterSetConfig {
            filters: vec![
                FilterDef {
                    name: "slow-link".to_string(),
                    kind: "delay".to_string(),
                    side: "source".to_string(),
                    target: "ept_alpha".to_string(),
                    input_type: String::new(),
                    output_type: String::new(),
                    properties: BTreeMap::from([(
                        "delay".to_string(),
                        serde_yaml::Value::from(0.5),
                    )]),
                    sources: Vec::new(),
                    destinations: Vec::new(),
                    deliver_to: Vec::new(),
                    enabled: true,
                },
                FilterDef {
                    name: "lossy-uplink".to_string(),
                    kind: "randomDrop".to_string(),
                    side: "source".to_string(),
                    target: "ept_alpha".to_string(),
                    input_type: String::new(),
                    output_type: String::new(),
                    properties: BTreeMap::from([(
                        "dropProb".to_string(),
                        serde_yaml::Value::from(0.05),
                    )]),
                    sources: Vec::new(),
                    destinations: Vec::new(),
                    deliver_to: Vec::new(),
                    enabled: true,
                },
                FilterDef {
                    name: "detour".to_string(),
                    kind: "reroute".to_string(),
                    side: "destination".to_string(),
                    target: "ept_beta".to_string(),
                    input_type: String::new(),
                    output_type: String::new(),
                    properties: BTreeMap::from([(
                        "newdestination".to_string(),
                        serde_yaml::Value::from("ept_gamma"),
                    )]),
                    sources: Vec::new(),
                    destinations: Vec::new(),
                    deliver_to: Vec::new(),
                    enabled: true,
                },
                FilterDef {
                    name: "audit-tap".to_string(),
                    kind: "clone".to_string(),
                    side: "source".to_string(),
                    target: String::new(),
                    input_type: String::new(),
                    output_type: String::new(),
                    properties: BTreeMap::new(),
                    sources: vec!["ept_alpha".to_string()],
                    destinations: vec!["ept_beta".to_string()],
                    deliver_to: vec!["audit".to_string()],
                    enabled: true,
                },
            ],
        }
    }
}
