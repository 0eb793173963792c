//! Compose file schema

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// The parts of a compose file relevant to right-sizing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeFile {
    /// Project name, when declared
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeService {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub deploy: Option<Deploy>,
}

/// Labels in either map or `key=value` list form
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Labels {
    Map(HashMap<String, String>),
    List(Vec<String>),
}

impl Default for Labels {
    fn default() -> Self {
        Labels::Map(HashMap::new())
    }
}

impl Labels {
    /// Labels as key/value pairs; a list entry without `=` has an empty value
    pub fn to_map(&self) -> HashMap<String, String> {
        match self {
            Labels::Map(map) => map.clone(),
            Labels::List(entries) => entries
                .iter()
                .map(|entry| match entry.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (entry.clone(), String::new()),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Deploy {
    #[serde(default)]
    pub resources: Option<Resources>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
    #[serde(default)]
    pub reservations: Option<ResourceLimits>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceLimits {
    #[serde(default, deserialize_with = "scalar_string")]
    pub cpus: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub memory: Option<String>,
}

/// Accept `cpus: 0.5` as well as `cpus: "0.5"`
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl ComposeFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read compose file {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("Failed to parse compose file {}", path.display()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid compose YAML")
    }
}

impl ComposeService {
    /// Declared `deploy.resources.limits`, if any
    pub fn limits(&self) -> Option<&ResourceLimits> {
        self.deploy
            .as_ref()
            .and_then(|d| d.resources.as_ref())
            .and_then(|r| r.limits.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = r#"
name: shop
services:
  db:
    image: postgres:16
    labels:
      rightsize.tier: gold
    deploy:
      resources:
        limits:
          memory: 2g
          cpus: 1.5
  web:
    image: nginx:alpine
    labels:
      - "rightsize.kind=web"
      - "traefik.enable"
    ports:
      - "80:80"
"#;

    #[test]
    fn test_parse_compose() {
        let compose = ComposeFile::from_str(COMPOSE).unwrap();
        assert_eq!(compose.name.as_deref(), Some("shop"));
        assert_eq!(compose.services.len(), 2);

        let db = &compose.services["db"];
        let limits = db.limits().unwrap();
        assert_eq!(limits.memory.as_deref(), Some("2g"));
        assert_eq!(limits.cpus.as_deref(), Some("1.5"));
        assert_eq!(db.labels.to_map()["rightsize.tier"], "gold");
    }

    #[test]
    fn test_list_labels() {
        let compose = ComposeFile::from_str(COMPOSE).unwrap();
        let labels = compose.services["web"].labels.to_map();
        assert_eq!(labels["rightsize.kind"], "web");
        assert_eq!(labels["traefik.enable"], "");
        assert!(compose.services["web"].limits().is_none());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(ComposeFile::from_str("services: [").is_err());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = ComposeFile::from_path(Path::new("/no/such/compose.yml")).unwrap_err();
        assert!(err.to_string().contains("/no/such/compose.yml"));
    }
}
