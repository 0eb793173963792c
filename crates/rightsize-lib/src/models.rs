//! Core data models shared by the collector and the rule engine

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Selector key compared against [`Service::kind`] instead of metadata
pub const KIND_KEY: &str = "kind";

/// Selector value that matches any (or no) attribute value
pub const WILDCARD: &str = "*";

/// A service declared in a compose file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    /// Classification such as db, cache or web. May be empty.
    pub kind: String,
    /// Side-channel attributes: engine, image, declared limits, user labels
    pub metadata: HashMap<String, String>,
}

impl Service {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A single runtime fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Error returned when a fact cannot be read as a number
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("value {value:?} is not numeric")]
pub struct NotNumeric {
    pub value: String,
}

impl FactValue {
    /// Coerce to a float. Integers and floats convert directly, strings are parsed.
    pub fn as_f64(&self) -> Result<f64, NotNumeric> {
        match self {
            FactValue::Int(v) => Ok(*v as f64),
            FactValue::Float(v) => Ok(*v),
            FactValue::Str(s) => s.trim().parse::<f64>().map_err(|_| NotNumeric {
                value: s.clone(),
            }),
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Int(v) => write!(f, "{}", v),
            FactValue::Float(v) => write!(f, "{}", v),
            FactValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FactValue {
    fn from(v: i64) -> Self {
        FactValue::Int(v)
    }
}

impl From<i32> for FactValue {
    fn from(v: i32) -> Self {
        FactValue::Int(v as i64)
    }
}

impl From<f64> for FactValue {
    fn from(v: f64) -> Self {
        FactValue::Float(v)
    }
}

impl From<&str> for FactValue {
    fn from(v: &str) -> Self {
        FactValue::Str(v.to_string())
    }
}

impl From<String> for FactValue {
    fn from(v: String) -> Self {
        FactValue::Str(v)
    }
}

/// Point-in-time fact bag for one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceStats(BTreeMap<String, FactValue>);

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FactValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FactValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FactValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FactValue>> FromIterator<(K, V)> for ServiceStats {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A single right-sizing rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier, by convention `name@semver`
    pub id: String,
    #[serde(default)]
    pub priority: i32,
    /// Attribute selector. Empty matches every service.
    #[serde(rename = "match", default)]
    pub selector: BTreeMap<String, String>,
    /// Optional single comparison, e.g. `peak_mem_mb > 800`
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set_env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Resolved change-set for one service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub service_name: String,
    pub set: BTreeMap<String, String>,
    pub set_env: BTreeMap<String, String>,
    pub action: Option<String>,
    pub priority: i32,
    pub rule_id: Option<String>,
}

impl Patch {
    /// Empty patch: no rule matched
    pub fn empty(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// True when the patch recommends nothing
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.set_env.is_empty() && self.action.is_none()
    }
}

/// Metrics observed for one running container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedStats {
    pub container_id: String,
    /// Display name, often prefixed by the compose project
    pub container_name: String,
    pub memory_usage_mb: f64,
    /// Declared memory limit, 0 when unlimited
    pub memory_limit_mb: f64,
    /// Peak usage since container start
    pub memory_max_used_mb: f64,
    /// Usage across all cores relative to the host
    pub cpu_usage_percent: f64,
    pub timestamp: i64,
}

/// Running container as reported by the runtime listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub container_id: String,
    pub names: Vec<String>,
}

impl ContainerInfo {
    /// First listed name without the leading slash, or the id when unnamed
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/'))
            .unwrap_or(&self.container_id)
    }
}
