//! Stats collection from the container runtime
//!
//! This module fans out one task per running container, reads a one-shot
//! stats frame plus an inspection record for each, and gathers the results
//! into a [`StatsBatch`] bounded by a deadline. The runtime is reached through
//! [`ContainerRuntime`] so the fan-out can be exercised without a daemon.

mod docker;
mod r#loop;
pub mod usage;

#[cfg(test)]
mod tests;

pub use docker::DockerRuntime;
pub use r#loop::{
    BatchOutcome, CollectorConfig, FetchError, StatsBatch, StatsCollector,
    StatsCollectorBuilder,
};
pub use usage::{CpuSample, InspectInfo, MemorySample, RawStats};

use crate::models::ContainerInfo;
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for container runtime implementations
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List the running containers
    async fn list_running(&self) -> Result<Vec<ContainerInfo>>;

    /// Read the name and declared limits of a container
    async fn inspect(&self, container_id: &str) -> Result<InspectInfo>;

    /// Read a single, non-streaming stats frame
    async fn one_shot_stats(&self, container_id: &str) -> Result<RawStats>;
}
