//! Usage figures derived from raw runtime samples
//!
//! The runtime adapters translate their wire types into these records so the
//! derivation stays independent of any particular client library.

use crate::models::{ContainerInfo, ObservedStats};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Memory section of a single stats frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub usage_bytes: u64,
    pub max_usage_bytes: u64,
    /// Page cache included in `usage_bytes`, when the runtime reports it
    pub cache_bytes: Option<u64>,
}

/// Cumulative CPU counters at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuSample {
    /// Container CPU time in nanoseconds
    pub total_usage: u64,
    /// Host CPU time in nanoseconds
    pub system_usage: u64,
    /// 0 when unknown
    pub online_cpus: u64,
    /// Length of the per-core usage array, 0 when absent
    pub percpu_count: usize,
}

/// One-shot stats frame: current CPU counters plus the previous reading
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStats {
    pub id: String,
    pub name: String,
    pub memory: MemorySample,
    pub cpu: CpuSample,
    pub precpu: CpuSample,
}

/// The parts of a container inspection the collector needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectInfo {
    pub name: String,
    /// Declared memory limit in bytes, 0 when unlimited
    pub memory_limit_bytes: i64,
}

/// Active memory in MiB: usage minus page cache when the cache is reported
pub fn memory_usage_mb(memory: &MemorySample) -> f64 {
    let active = match memory.cache_bytes {
        Some(cache) => memory.usage_bytes.saturating_sub(cache),
        None => memory.usage_bytes,
    };
    active as f64 / BYTES_PER_MIB
}

/// Cores visible to the container: online CPUs, else per-core entries, else 1
pub fn online_cores(cpu: &CpuSample) -> u64 {
    if cpu.online_cpus > 0 {
        cpu.online_cpus
    } else if cpu.percpu_count > 0 {
        cpu.percpu_count as u64
    } else {
        1
    }
}

/// CPU usage relative to the host, scaled by online cores.
///
/// Returns 0 unless both the container and the system delta are positive.
pub fn cpu_percent(previous: &CpuSample, current: &CpuSample) -> f64 {
    let cpu_delta = current.total_usage as f64 - previous.total_usage as f64;
    let system_delta = current.system_usage as f64 - previous.system_usage as f64;

    if cpu_delta > 0.0 && system_delta > 0.0 {
        (cpu_delta / system_delta) * online_cores(current) as f64 * 100.0
    } else {
        0.0
    }
}

/// Build the observation for one container
pub fn observe(
    info: &ContainerInfo,
    raw: &RawStats,
    inspect: &InspectInfo,
    timestamp: i64,
) -> ObservedStats {
    let container_id = if raw.id.is_empty() {
        info.container_id.clone()
    } else {
        raw.id.clone()
    };
    let name = [raw.name.as_str(), inspect.name.as_str()]
        .into_iter()
        .map(|n| n.trim_start_matches('/'))
        .find(|n| !n.is_empty())
        .unwrap_or_else(|| info.display_name())
        .to_string();

    ObservedStats {
        container_id,
        container_name: name,
        memory_usage_mb: memory_usage_mb(&raw.memory),
        memory_limit_mb: inspect.memory_limit_bytes.max(0) as f64 / BYTES_PER_MIB,
        memory_max_used_mb: raw.memory.max_usage_bytes as f64 / BYTES_PER_MIB,
        cpu_usage_percent: cpu_percent(&raw.precpu, &raw.cpu),
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn cpu(total: u64, system: u64, online: u64) -> CpuSample {
        CpuSample {
            total_usage: total,
            system_usage: system,
            online_cpus: online,
            percpu_count: 0,
        }
    }

    #[test]
    fn test_memory_subtracts_cache() {
        let memory = MemorySample {
            usage_bytes: 500 * MIB,
            max_usage_bytes: 0,
            cache_bytes: Some(100 * MIB),
        };
        assert_eq!(memory_usage_mb(&memory), 400.0);
    }

    #[test]
    fn test_memory_without_cache() {
        let memory = MemorySample {
            usage_bytes: 256 * MIB,
            max_usage_bytes: 0,
            cache_bytes: None,
        };
        assert_eq!(memory_usage_mb(&memory), 256.0);
    }

    #[test]
    fn test_memory_cache_larger_than_usage() {
        let memory = MemorySample {
            usage_bytes: MIB,
            max_usage_bytes: 0,
            cache_bytes: Some(2 * MIB),
        };
        assert_eq!(memory_usage_mb(&memory), 0.0);
    }

    #[test]
    fn test_cpu_percent() {
        let percent = cpu_percent(&cpu(0, 0, 4), &cpu(200, 1000, 4));
        assert!((percent - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_cpu_percent_zero_deltas() {
        assert_eq!(cpu_percent(&cpu(100, 1000, 2), &cpu(100, 2000, 2)), 0.0);
        assert_eq!(cpu_percent(&cpu(100, 1000, 2), &cpu(200, 1000, 2)), 0.0);
        // counters reset after a restart
        assert_eq!(cpu_percent(&cpu(500, 1000, 2), &cpu(100, 2000, 2)), 0.0);
    }

    #[test]
    fn test_online_cores_fallback() {
        let mut sample = cpu(0, 0, 0);
        assert_eq!(online_cores(&sample), 1);
        sample.percpu_count = 8;
        assert_eq!(online_cores(&sample), 8);
        sample.online_cpus = 2;
        assert_eq!(online_cores(&sample), 2);
    }

    #[test]
    fn test_observe() {
        let info = ContainerInfo {
            container_id: "abc123".to_string(),
            names: vec!["/shop_db_1".to_string()],
        };
        let raw = RawStats {
            id: String::new(),
            name: "/shop_db_1".to_string(),
            memory: MemorySample {
                usage_bytes: 300 * MIB,
                max_usage_bytes: 512 * MIB,
                cache_bytes: Some(44 * MIB),
            },
            cpu: cpu(200, 1000, 4),
            precpu: cpu(0, 0, 4),
        };
        let inspect = InspectInfo {
            name: "/shop_db_1".to_string(),
            memory_limit_bytes: 1024 * MIB as i64,
        };

        let observed = observe(&info, &raw, &inspect, 1_700_000_000);
        assert_eq!(observed.container_id, "abc123");
        assert_eq!(observed.container_name, "shop_db_1");
        assert_eq!(observed.memory_usage_mb, 256.0);
        assert_eq!(observed.memory_limit_mb, 1024.0);
        assert_eq!(observed.memory_max_used_mb, 512.0);
        assert_eq!(observed.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_observe_name_fallback() {
        let info = ContainerInfo {
            container_id: "abc123".to_string(),
            names: vec!["/web".to_string()],
        };
        let observed = observe(&info, &RawStats::default(), &InspectInfo::default(), 0);
        assert_eq!(observed.container_name, "web");
        assert_eq!(observed.memory_limit_mb, 0.0);
    }
}
