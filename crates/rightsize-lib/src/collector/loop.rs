//! Deadline-bounded stats collection
//!
//! Implements the fan-out/fan-in that gathers one snapshot per running
//! container. Every container gets its own task; results and failures flow
//! back over two channels drained by a single select loop.

use super::usage;
use super::ContainerRuntime;
use crate::models::{ContainerInfo, ObservedStats};
use crate::observability::ScanMetrics;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for stats collection
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Upper bound for one batch (default: 30 seconds)
    pub timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Failure to collect one container; never fails the batch
#[derive(Debug, Error)]
#[error("failed fetching stats for {container_id} ({container_name}): {source}")]
pub struct FetchError {
    pub container_id: String,
    pub container_name: String,
    #[source]
    pub source: anyhow::Error,
}

impl FetchError {
    fn new(info: &ContainerInfo, source: anyhow::Error) -> Self {
        Self {
            container_id: info.container_id.clone(),
            container_name: info.display_name().to_string(),
            source,
        }
    }
}

/// How a batch ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every task reported back
    #[default]
    Complete,
    /// The deadline fired first; outstanding tasks were aborted
    DeadlineExceeded,
}

/// Results of one collection pass
#[derive(Debug, Default)]
pub struct StatsBatch {
    pub snapshots: Vec<ObservedStats>,
    pub warnings: Vec<FetchError>,
    pub outcome: BatchOutcome,
}

impl StatsBatch {
    pub fn deadline_exceeded(&self) -> bool {
        self.outcome == BatchOutcome::DeadlineExceeded
    }
}

/// Collects one snapshot per running container
pub struct StatsCollector {
    runtime: Arc<dyn ContainerRuntime>,
    config: CollectorConfig,
    metrics: ScanMetrics,
}

impl StatsCollector {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: CollectorConfig) -> Self {
        Self {
            runtime,
            config,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Collect with the configured timeout
    pub async fn collect_with_timeout(&self) -> Result<StatsBatch> {
        self.collect(Instant::now() + self.config.timeout).await
    }

    /// Collect every running container, stopping at `deadline`.
    ///
    /// Only a failure to list containers is an error. Per-container failures
    /// are returned as warnings, and hitting the deadline (during listing or
    /// fetching) returns whatever arrived so far with
    /// [`BatchOutcome::DeadlineExceeded`]. Outstanding tasks are aborted and
    /// reaped before returning.
    pub async fn collect(&self, deadline: Instant) -> Result<StatsBatch> {
        let start = Instant::now();

        let containers = match tokio::time::timeout_at(deadline, self.runtime.list_running()).await
        {
            Ok(listed) => listed.context("Failed to list running containers")?,
            Err(_) => {
                warn!("Stats collection deadline exceeded while listing containers");
                let batch = StatsBatch {
                    outcome: BatchOutcome::DeadlineExceeded,
                    ..Default::default()
                };
                self.record(&batch, start.elapsed());
                return Ok(batch);
            }
        };

        info!(containers = containers.len(), "Collecting container stats");

        let capacity = containers.len().max(1);
        let (stats_tx, mut stats_rx) = mpsc::channel::<ObservedStats>(capacity);
        let (error_tx, mut error_rx) = mpsc::channel::<FetchError>(capacity);
        let mut tasks = JoinSet::new();

        for info in containers {
            let runtime = Arc::clone(&self.runtime);
            let stats_tx = stats_tx.clone();
            let error_tx = error_tx.clone();

            tasks.spawn(async move {
                match fetch_container(runtime.as_ref(), &info).await {
                    Ok(stats) => {
                        let _ = stats_tx.send(stats).await;
                    }
                    Err(e) => {
                        let _ = error_tx.send(e).await;
                    }
                }
            });
        }

        // Only the tasks hold senders now, so both channels close once every task is done
        drop(stats_tx);
        drop(error_tx);

        let mut batch = StatsBatch::default();
        let mut stats_open = true;
        let mut errors_open = true;
        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        while stats_open || errors_open {
            tokio::select! {
                received = stats_rx.recv(), if stats_open => match received {
                    Some(stats) => batch.snapshots.push(stats),
                    None => stats_open = false,
                },
                received = error_rx.recv(), if errors_open => match received {
                    Some(e) => {
                        warn!(
                            container_id = %e.container_id,
                            container_name = %e.container_name,
                            error = %e.source,
                            "Failed to collect container stats"
                        );
                        batch.warnings.push(e);
                    }
                    None => errors_open = false,
                },
                _ = &mut expiry => {
                    warn!(
                        collected = batch.snapshots.len(),
                        errors = batch.warnings.len(),
                        outstanding = tasks.len(),
                        "Stats collection deadline exceeded"
                    );
                    batch.outcome = BatchOutcome::DeadlineExceeded;
                    tasks.abort_all();
                    break;
                }
            }
        }

        // Reap every task, including those aborted at the deadline
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!(error = %e, "Stats task panicked");
                }
            }
        }

        let elapsed = start.elapsed();
        self.record(&batch, elapsed);

        debug!(
            snapshots = batch.snapshots.len(),
            errors = batch.warnings.len(),
            elapsed_ms = elapsed.as_millis(),
            outcome = ?batch.outcome,
            "Collection complete"
        );

        Ok(batch)
    }

    fn record(&self, batch: &StatsBatch, elapsed: Duration) {
        self.metrics.observe_collection_latency(elapsed.as_secs_f64());
        self.metrics.add_containers_collected(batch.snapshots.len());
        self.metrics.add_fetch_errors(batch.warnings.len());
        if batch.deadline_exceeded() {
            self.metrics.inc_deadline_exceeded();
        }
    }
}

/// Fetch stats then inspection for a single container
async fn fetch_container(
    runtime: &dyn ContainerRuntime,
    info: &ContainerInfo,
) -> Result<ObservedStats, FetchError> {
    let raw = runtime
        .one_shot_stats(&info.container_id)
        .await
        .map_err(|e| FetchError::new(info, e))?;
    let inspect = runtime
        .inspect(&info.container_id)
        .await
        .map_err(|e| FetchError::new(info, e))?;

    Ok(usage::observe(
        info,
        &raw,
        &inspect,
        chrono::Utc::now().timestamp(),
    ))
}

/// Builder for configuring a [`StatsCollector`]
pub struct StatsCollectorBuilder {
    runtime: Option<Arc<dyn ContainerRuntime>>,
    config: CollectorConfig,
}

impl StatsCollectorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            runtime: None,
            config: CollectorConfig::default(),
        }
    }

    /// Set the container runtime
    pub fn runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Set the batch timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<StatsCollector> {
        let runtime = self
            .runtime
            .ok_or_else(|| anyhow::anyhow!("Container runtime is required"))?;

        Ok(StatsCollector::new(runtime, self.config))
    }
}

impl Default for StatsCollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
