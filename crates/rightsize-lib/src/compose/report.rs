//! Per-service report combining static warnings and the resolved patch

use super::checks::static_warnings;
use crate::models::{Patch, Service};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Metadata key holding the declared value for a patch key
fn declared_key(patch_key: &str) -> &str {
    match patch_key {
        "mem_limit" => "memory_limit",
        "cpus" => "cpu_limit",
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceReport {
    pub service_name: String,
    pub static_warnings: Vec<String>,
    /// Resolved patch, absent when no rule produced a change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
    /// Declared value of each `set` key, `None` when not declared
    pub current: BTreeMap<String, Option<String>>,
}

impl ServiceReport {
    pub fn has_findings(&self) -> bool {
        !self.static_warnings.is_empty() || self.patch.is_some()
    }
}

/// One report per service, in service order
pub fn build_reports(services: &[Service], patches: &HashMap<String, Patch>) -> Vec<ServiceReport> {
    services
        .iter()
        .map(|service| {
            let patch = patches
                .get(&service.name)
                .filter(|p| !p.is_empty())
                .cloned();
            let current = patch
                .iter()
                .flat_map(|p| p.set.keys())
                .map(|key| {
                    let declared = service.metadata.get(declared_key(key)).cloned();
                    (key.clone(), declared)
                })
                .collect();

            ServiceReport {
                service_name: service.name.clone(),
                static_warnings: static_warnings(service),
                patch,
                current,
            }
        })
        .collect()
}
