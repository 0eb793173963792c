//! Compose project scanning

use anyhow::{Context, Result};
use rightsize_lib::collector::{DockerRuntime, StatsCollectorBuilder};
use rightsize_lib::compose::{
    build_reports, extract_services, map_stats_to_services, simulated_stats, ComposeFile,
    DuplicateContainer, ServiceReport,
};
use rightsize_lib::rules::Engine;
use rightsize_lib::{Patch, ScanLogger, ScanMetrics, Service, ServiceStats};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::load_rules;
use crate::output::{print_info, print_json, print_warning, render_reports, OutputFormat};

/// Resolved options for one scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub compose: Option<PathBuf>,
    pub simulate: bool,
    pub timeout: Duration,
    pub rules_dir: Option<PathBuf>,
    pub format: OutputFormat,
    pub metrics: bool,
}

/// What happened while collecting live stats
#[derive(Debug, Default, Serialize)]
struct CollectionSummary {
    snapshots: usize,
    warnings: Vec<String>,
    deadline_exceeded: bool,
    unmatched: Vec<String>,
    duplicates: Vec<DuplicateContainer>,
}

#[derive(Debug, Serialize)]
struct ScanReport {
    compose_file: String,
    rules_version: Option<String>,
    simulated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection: Option<CollectionSummary>,
    services: Vec<ServiceReport>,
}

/// Scan a compose project and print the report
pub async fn run(options: ScanOptions) -> Result<()> {
    let Some(compose_path) = options.compose.as_deref() else {
        print_info("Scanning running containers needs a compose file to map them to services.");
        print_info("Usage: rightsize scan <compose-file> [--simulate]");
        return Ok(());
    };

    let rules = load_rules(options.rules_dir.as_deref())?;
    let compose = ComposeFile::from_path(compose_path)?;
    let services = extract_services(&compose);

    let logger = ScanLogger::new(project_name(&compose, compose_path));
    logger.log_scan_started(
        services.len(),
        rules.len(),
        rules.version().unwrap_or("unversioned"),
        !options.simulate,
    );

    let (facts, collection) = if options.simulate {
        (simulated_stats(&services), None)
    } else {
        let (facts, summary) = collect_live(&services, options.timeout, &logger).await?;
        (facts, Some(summary))
    };

    for (service, service_facts) in &facts {
        debug!(service = %service, facts = ?service_facts, "Facts passed to rule engine");
    }

    let patches = evaluate(&rules, &services, &facts, &logger);
    let reports = build_reports(&services, &patches);

    logger.log_scan_finished(
        patches.values().filter(|p| !p.is_empty()).count(),
        reports.iter().map(|r| r.static_warnings.len()).sum(),
    );

    match options.format {
        OutputFormat::Json => print_json(&ScanReport {
            compose_file: compose_path.display().to_string(),
            rules_version: rules.version().map(str::to_string),
            simulated: options.simulate,
            collection,
            services: reports,
        })?,
        OutputFormat::Table => {
            print_info(&format!(
                "Scanned {} services from {} with {} rules{}",
                services.len(),
                compose_path.display(),
                rules.len(),
                if options.simulate { " (simulated stats)" } else { "" }
            ));
            if let Some(summary) = &collection {
                print_collection(summary);
            }
            println!();
            println!("{}", render_reports(&reports));
        }
    }

    if options.metrics {
        let metrics = ScanMetrics::new();
        eprintln!("{}", metrics.render()?);
    }

    Ok(())
}

/// Collect live stats and map them onto the compose services
async fn collect_live(
    services: &[Service],
    timeout: Duration,
    logger: &ScanLogger,
) -> Result<(BTreeMap<String, ServiceStats>, CollectionSummary)> {
    let runtime = DockerRuntime::connect()
        .await
        .context("Failed to connect to Docker daemon. Is Docker running?")?;

    let collector = StatsCollectorBuilder::new()
        .runtime(Arc::new(runtime))
        .timeout(timeout)
        .build()?;

    let batch = collector.collect_with_timeout().await?;
    logger.log_batch_collected(
        batch.snapshots.len(),
        batch.warnings.len(),
        batch.deadline_exceeded(),
    );

    let mapping = map_stats_to_services(&batch.snapshots, services);
    for container in &mapping.unmatched {
        logger.log_unmatched_container(container);
    }

    let summary = CollectionSummary {
        snapshots: batch.snapshots.len(),
        warnings: batch.warnings.iter().map(ToString::to_string).collect(),
        deadline_exceeded: batch.deadline_exceeded(),
        unmatched: mapping.unmatched,
        duplicates: mapping.duplicates,
    };

    Ok((mapping.facts, summary))
}

/// Run the engine for every service; services without facts get an empty bag
fn evaluate(
    rules: &[rightsize_lib::Rule],
    services: &[Service],
    facts: &BTreeMap<String, ServiceStats>,
    logger: &ScanLogger,
) -> HashMap<String, Patch> {
    let engine = Engine::new();
    let metrics = ScanMetrics::new();
    let no_facts = ServiceStats::new();

    services
        .iter()
        .map(|service| {
            let service_facts = facts.get(&service.name).unwrap_or(&no_facts);
            let evaluation = engine.evaluate(rules, service, service_facts);

            for dropped in &evaluation.dropped {
                metrics.inc_rule_dropped(&dropped.reason);
            }
            if !evaluation.patch.is_empty() {
                metrics.inc_patches_produced();
                logger.log_patch(&evaluation.patch);
            }

            (service.name.clone(), evaluation.patch)
        })
        .collect()
}

fn print_collection(summary: &CollectionSummary) {
    print_info(&format!(
        "Collected stats for {} running containers",
        summary.snapshots
    ));
    if summary.deadline_exceeded {
        print_warning("Stats collection timed out, the report uses partial results");
    }
    for warning in &summary.warnings {
        print_warning(warning);
    }
    for container in &summary.unmatched {
        print_warning(&format!(
            "Could not map container '{}' to a compose service, skipping its stats",
            container
        ));
    }
    for duplicate in &summary.duplicates {
        print_warning(&format!(
            "Multiple containers match service '{}', ignoring '{}'",
            duplicate.service_name, duplicate.container_name
        ));
    }
}

/// Declared project name, else the directory holding the compose file
fn project_name(compose: &ComposeFile, path: &Path) -> String {
    compose
        .name
        .clone()
        .or_else(|| {
            let absolute = path.canonicalize().ok()?;
            let dir = absolute.parent()?.file_name()?;
            Some(dir.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "default".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rightsize_lib::rules::load_embedded;

    #[test]
    fn test_evaluate_simulated_db() {
        let rules = load_embedded().unwrap();
        let services = vec![Service::new("db", "db").with_metadata("engine", "postgres")];
        let facts = simulated_stats(&services);

        let patches = evaluate(&rules, &services, &facts, &ScanLogger::new("test"));
        let db = &patches["db"];

        assert_eq!(db.rule_id.as_deref(), Some("mem-cap-db@1.0.0"));
        assert_eq!(db.set["mem_limit"], "1500m");
        assert_eq!(db.set["cpus"], "0.5");
        assert_eq!(db.set_env["POSTGRES_SHARED_BUFFERS"], "300MB");
    }

    #[test]
    fn test_project_name() {
        let compose = ComposeFile::from_str("name: shop\nservices: {}\n").unwrap();
        assert_eq!(project_name(&compose, Path::new("compose.yml")), "shop");
    }
}
