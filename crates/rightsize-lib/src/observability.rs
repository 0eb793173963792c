//! Observability infrastructure for scans
//!
//! Provides:
//! - Prometheus metrics (collection latency, containers, fetch errors, dropped rules)
//! - Structured logging of scan events with tracing

use crate::models::Patch;
use crate::rules::DropReason;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for batch collection latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ScanMetricsInner> = OnceLock::new();

struct ScanMetricsInner {
    collection_latency_seconds: Histogram,
    containers_collected: IntCounter,
    fetch_errors: IntCounter,
    deadline_exceeded: IntCounter,
    rules_dropped: IntCounterVec,
    patches_produced: IntCounter,
}

impl ScanMetricsInner {
    fn new() -> Self {
        Self {
            collection_latency_seconds: register_histogram!(
                "rightsize_collection_latency_seconds",
                "Time spent collecting one stats batch from the container runtime",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_latency_seconds"),

            containers_collected: register_int_counter!(
                "rightsize_containers_collected_total",
                "Total number of container snapshots collected"
            )
            .expect("Failed to register containers_collected"),

            fetch_errors: register_int_counter!(
                "rightsize_fetch_errors_total",
                "Total number of per-container fetch failures"
            )
            .expect("Failed to register fetch_errors"),

            deadline_exceeded: register_int_counter!(
                "rightsize_deadline_exceeded_total",
                "Total number of stats batches cut short by the deadline"
            )
            .expect("Failed to register deadline_exceeded"),

            rules_dropped: register_int_counter_vec!(
                "rightsize_rules_dropped_total",
                "Matched rules that did not produce a candidate, by reason",
                &["reason"]
            )
            .expect("Failed to register rules_dropped"),

            patches_produced: register_int_counter!(
                "rightsize_patches_produced_total",
                "Total number of non-empty patches produced"
            )
            .expect("Failed to register patches_produced"),
        }
    }
}

/// Scan metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ScanMetrics {
    _private: (),
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScanMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanMetrics").finish_non_exhaustive()
    }
}

impl ScanMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScanMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScanMetricsInner {
        GLOBAL_METRICS.get_or_init(ScanMetricsInner::new)
    }

    pub fn observe_collection_latency(&self, duration_secs: f64) {
        self.inner().collection_latency_seconds.observe(duration_secs);
    }

    pub fn add_containers_collected(&self, count: usize) {
        self.inner().containers_collected.inc_by(count as u64);
    }

    pub fn add_fetch_errors(&self, count: usize) {
        self.inner().fetch_errors.inc_by(count as u64);
    }

    pub fn inc_deadline_exceeded(&self) {
        self.inner().deadline_exceeded.inc();
    }

    /// Count one dropped rule under its reason label
    pub fn inc_rule_dropped(&self, reason: &DropReason) {
        self.inner()
            .rules_dropped
            .with_label_values(&[reason.label()])
            .inc();
    }

    pub fn inc_patches_produced(&self) {
        self.inner().patches_produced.inc();
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Structured logger for scan events
///
/// Every event carries the compose project it belongs to so JSON logs from
/// several scans can be told apart.
#[derive(Debug, Clone)]
pub struct ScanLogger {
    project: String,
}

impl ScanLogger {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    pub fn log_scan_started(&self, services: usize, rules: usize, rules_version: &str, live: bool) {
        info!(
            event = "scan_started",
            project = %self.project,
            services = services,
            rules = rules,
            rules_version = %rules_version,
            live = live,
            "Scan started"
        );
    }

    pub fn log_batch_collected(&self, snapshots: usize, warnings: usize, deadline_exceeded: bool) {
        if deadline_exceeded {
            warn!(
                event = "stats_collected",
                project = %self.project,
                snapshots = snapshots,
                warnings = warnings,
                deadline_exceeded = true,
                "Stats collection hit the deadline, continuing with partial results"
            );
        } else {
            info!(
                event = "stats_collected",
                project = %self.project,
                snapshots = snapshots,
                warnings = warnings,
                deadline_exceeded = false,
                "Stats collected"
            );
        }
    }

    pub fn log_unmatched_container(&self, container_name: &str) {
        info!(
            event = "container_unmatched",
            project = %self.project,
            container_name = %container_name,
            "Container does not belong to any compose service"
        );
    }

    pub fn log_patch(&self, patch: &Patch) {
        info!(
            event = "patch_produced",
            project = %self.project,
            service = %patch.service_name,
            rule_id = ?patch.rule_id,
            priority = patch.priority,
            set_keys = patch.set.len(),
            env_keys = patch.set_env.len(),
            action = ?patch.action,
            "Recommendation produced"
        );
    }

    pub fn log_scan_finished(&self, patches: usize, warnings: usize) {
        info!(
            event = "scan_finished",
            project = %self.project,
            patches = patches,
            warnings = warnings,
            "Scan finished"
        );
    }
}
