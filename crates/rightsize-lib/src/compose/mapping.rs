//! Container to service mapping
//!
//! Compose names containers `<project>_<service>_<n>` or
//! `<project>-<service>-<n>`, so a container belongs to service `s` when its
//! name contains `_s_` or `-s-`, or ends with `_s` or `-s`.

use crate::models::{ObservedStats, Service, ServiceStats};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A container skipped because its service already had stats
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateContainer {
    pub service_name: String,
    pub container_name: String,
}

/// Per-service facts plus the containers that could not be used
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsMapping {
    pub facts: BTreeMap<String, ServiceStats>,
    pub unmatched: Vec<String>,
    pub duplicates: Vec<DuplicateContainer>,
}

fn belongs_to(container_name: &str, service_name: &str) -> bool {
    let underscored = format!("_{}", service_name);
    let dashed = format!("-{}", service_name);

    container_name.contains(&format!("{}_", underscored))
        || container_name.contains(&format!("{}-", dashed))
        || container_name.ends_with(&underscored)
        || container_name.ends_with(&dashed)
}

/// Fact bag for one matched container
fn service_facts(service_name: &str, stats: &ObservedStats) -> ServiceStats {
    // max_usage is not reported under cgroup v2
    let peak = stats.memory_max_used_mb.max(stats.memory_usage_mb);

    ServiceStats::new()
        .with("service_name", service_name)
        .with("container_id", stats.container_id.as_str())
        .with("container_name", stats.container_name.as_str())
        .with("peak_mem_mb", peak)
        .with("avg_mem_mb", stats.memory_usage_mb)
        .with("current_mem_mb", stats.memory_usage_mb)
        .with("mem_limit_mb", stats.memory_limit_mb)
        .with("peak_cpu_percent", stats.cpu_usage_percent)
        .with("current_cpu_percent", stats.cpu_usage_percent)
}

/// Assign each snapshot to the first service whose name pattern it matches.
///
/// Snapshots are taken in container name order (then id), whatever order
/// they were collected in. The first container of a service wins; later ones
/// are reported as duplicates rather than aggregated.
pub fn map_stats_to_services(snapshots: &[ObservedStats], services: &[Service]) -> StatsMapping {
    let mut mapping = StatsMapping::default();

    let mut ordered: Vec<&ObservedStats> = snapshots.iter().collect();
    ordered.sort_by(|a, b| {
        a.container_name
            .cmp(&b.container_name)
            .then_with(|| a.container_id.cmp(&b.container_id))
    });

    for stats in ordered {
        let Some(service) = services
            .iter()
            .find(|svc| belongs_to(&stats.container_name, &svc.name))
        else {
            debug!(container_name = %stats.container_name, "No service matches container");
            mapping.unmatched.push(stats.container_name.clone());
            continue;
        };

        if mapping.facts.contains_key(&service.name) {
            debug!(
                service = %service.name,
                container_name = %stats.container_name,
                "Service already has stats, skipping container"
            );
            mapping.duplicates.push(DuplicateContainer {
                service_name: service.name.clone(),
                container_name: stats.container_name.clone(),
            });
            continue;
        }

        mapping
            .facts
            .insert(service.name.clone(), service_facts(&service.name, stats));
    }

    mapping
}
