//! Compose services to rule engine services

use super::file::{ComposeFile, ComposeService};
use crate::models::{Service, ServiceStats, KIND_KEY};
use std::collections::{BTreeMap, HashMap};

/// Labels with this prefix become service metadata
pub const LABEL_PREFIX: &str = "rightsize.";

const KIND_BY_IMAGE: &[(&str, &[&str])] = &[
    ("db", &["postgres", "mysql", "mariadb"]),
    ("cache", &["redis", "memcached"]),
    ("web", &["nginx", "httpd", "caddy"]),
];

const LANG_BY_IMAGE: &[(&str, &[&str])] = &[
    ("node", &["node"]),
    ("python", &["python"]),
    ("java", &["java", "openjdk", "maven", "gradle"]),
];

const ENGINE_BY_KIND: &[(&str, &str)] = &[("db", "postgres"), ("cache", "redis"), ("web", "nginx")];

fn infer(image: &str, table: &[(&'static str, &[&str])]) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, prefixes)| prefixes.iter().any(|p| image.starts_with(p)))
        .map(|(value, _)| *value)
}

/// Turn every compose service into a [`Service`], sorted by name.
///
/// `rightsize.<key>` labels win over anything inferred from the image.
pub fn extract_services(compose: &ComposeFile) -> Vec<Service> {
    compose
        .services
        .iter()
        .map(|(name, svc)| to_service(name, svc))
        .collect()
}

fn to_service(name: &str, svc: &ComposeService) -> Service {
    let mut metadata: HashMap<String, String> = svc
        .labels
        .to_map()
        .into_iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(LABEL_PREFIX)
                .map(|stripped| (stripped.to_string(), value))
        })
        .collect();

    let image = svc.image.as_str();
    if !image.is_empty() {
        if !metadata.contains_key(KIND_KEY) {
            if let Some(kind) = infer(image, KIND_BY_IMAGE) {
                metadata.insert(KIND_KEY.to_string(), kind.to_string());
            }
        }
        if !metadata.contains_key("lang") {
            if let Some(lang) = infer(image, LANG_BY_IMAGE) {
                metadata.insert("lang".to_string(), lang.to_string());
            }
        }
        if !metadata.contains_key("engine") {
            let kind = metadata.get(KIND_KEY).map(String::as_str).unwrap_or("");
            let engine = ENGINE_BY_KIND
                .iter()
                .find(|(k, engine)| *k == kind && image.starts_with(engine))
                .map(|(_, engine)| engine.to_string());
            if let Some(engine) = engine {
                metadata.insert("engine".to_string(), engine);
            }
        }
    }

    metadata.insert("image".to_string(), svc.image.clone());

    if let Some(limits) = svc.limits() {
        if let Some(memory) = limits.memory.as_deref().filter(|m| !m.is_empty()) {
            metadata.insert("memory_limit".to_string(), memory.to_string());
        }
        if let Some(cpus) = limits.cpus.as_deref().filter(|c| !c.is_empty()) {
            metadata.insert("cpu_limit".to_string(), cpus.to_string());
        }
    }

    Service {
        name: name.to_string(),
        kind: metadata.get(KIND_KEY).cloned().unwrap_or_default(),
        metadata,
    }
}

/// Fixed per-kind facts for offline runs
pub fn simulated_stats(services: &[Service]) -> BTreeMap<String, ServiceStats> {
    services
        .iter()
        .map(|svc| {
            let (peak, avg, cpu) = match svc.kind.as_str() {
                "db" => (1200, 800, 60),
                "web" => (400, 250, 30),
                "cache" => (600, 450, 15),
                _ => (300, 200, 20),
            };
            let stats = ServiceStats::new()
                .with("service_name", svc.name.as_str())
                .with("peak_mem_mb", peak)
                .with("avg_mem_mb", avg)
                .with("peak_cpu_percent", cpu);
            (svc.name.clone(), stats)
        })
        .collect()
}
