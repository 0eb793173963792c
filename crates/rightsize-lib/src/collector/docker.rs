//! Docker Engine API runtime backed by bollard

use super::usage::{CpuSample, InspectInfo, MemorySample, RawStats};
use super::ContainerRuntime;
use crate::models::ContainerInfo;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bollard::container::{
    CPUStats, InspectContainerOptions, ListContainersOptions, MemoryStats, MemoryStatsStats,
    Stats, StatsOptions,
};
use bollard::Docker;
use tokio_stream::StreamExt;
use std::time::Duration;
use tracing::debug;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Container runtime talking to the local Docker daemon
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect with the local defaults (socket path or `DOCKER_HOST`) and ping the daemon
    pub async fn connect() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("Failed to create Docker client")?;
        let version = tokio::time::timeout(PING_TIMEOUT, docker.ping())
            .await
            .map_err(|_| anyhow!("Docker daemon did not answer within {:?}", PING_TIMEOUT))?
            .context("Failed to connect to the Docker daemon")?;
        debug!(ping = %version, "Connected to Docker daemon");

        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self) -> Result<Vec<ContainerInfo>> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .context("Failed to list containers")?;

        Ok(containers
            .into_iter()
            .filter_map(|summary| {
                Some(ContainerInfo {
                    container_id: summary.id?,
                    names: summary.names.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn inspect(&self, container_id: &str) -> Result<InspectInfo> {
        let details = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .with_context(|| format!("Failed to inspect container {}", container_id))?;

        Ok(InspectInfo {
            name: details.name.unwrap_or_default(),
            memory_limit_bytes: details
                .host_config
                .and_then(|host| host.memory)
                .unwrap_or(0),
        })
    }

    async fn one_shot_stats(&self, container_id: &str) -> Result<RawStats> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
        };
        let stream = self.docker.stats(container_id, Some(options));
        tokio::pin!(stream);

        let stats = stream
            .next()
            .await
            .ok_or_else(|| anyhow!("No stats frame returned for container {}", container_id))?
            .with_context(|| format!("Failed to read stats for container {}", container_id))?;

        Ok(raw_stats(&stats))
    }
}

fn raw_stats(stats: &Stats) -> RawStats {
    RawStats {
        id: stats.id.clone(),
        name: stats.name.clone(),
        memory: memory_sample(&stats.memory_stats),
        cpu: cpu_sample(&stats.cpu_stats),
        precpu: cpu_sample(&stats.precpu_stats),
    }
}

fn memory_sample(memory: &MemoryStats) -> MemorySample {
    let cache_bytes = match &memory.stats {
        Some(MemoryStatsStats::V1(v1)) => Some(v1.cache),
        Some(MemoryStatsStats::V2(v2)) => Some(v2.file),
        None => None,
    };

    MemorySample {
        usage_bytes: memory.usage.unwrap_or(0),
        max_usage_bytes: memory.max_usage.unwrap_or(0),
        cache_bytes,
    }
}

fn cpu_sample(cpu: &CPUStats) -> CpuSample {
    CpuSample {
        total_usage: cpu.cpu_usage.total_usage,
        system_usage: cpu.system_cpu_usage.unwrap_or(0),
        online_cpus: cpu.online_cpus.unwrap_or(0),
        percpu_count: cpu.cpu_usage.percpu_usage.as_ref().map_or(0, Vec::len),
    }
}
