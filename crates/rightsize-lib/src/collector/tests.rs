//! Integration tests for stats collection
//!
//! These tests drive the collector through a mock runtime so fan-out,
//! partial failure and deadline handling can be checked without a daemon.

#[cfg(test)]
mod mock_runtime_tests {
    use crate::collector::{
        BatchOutcome, ContainerRuntime, CpuSample, InspectInfo, MemorySample, RawStats,
        StatsCollectorBuilder,
    };
    use crate::models::ContainerInfo;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    const MIB: u64 = 1024 * 1024;

    /// Runtime serving canned stats, with per-container failure and delay
    #[derive(Default)]
    struct MockRuntime {
        containers: Vec<ContainerInfo>,
        failing: HashSet<String>,
        slow: HashSet<String>,
        fail_listing: bool,
        slow_listing: bool,
        stats_calls: AtomicUsize,
        slow_finished: AtomicUsize,
        slow_cancelled: AtomicUsize,
    }

    /// Counts a slow fetch that was dropped before it finished
    struct CancelGuard<'a> {
        counter: &'a AtomicUsize,
        armed: bool,
    }

    impl<'a> CancelGuard<'a> {
        fn new(counter: &'a AtomicUsize) -> Self {
            Self {
                counter,
                armed: true,
            }
        }

        fn disarm(mut self) {
            self.armed = false;
        }
    }

    impl Drop for CancelGuard<'_> {
        fn drop(&mut self) {
            if self.armed {
                self.counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl MockRuntime {
        fn with_containers(names: &[&str]) -> Self {
            Self {
                containers: names
                    .iter()
                    .map(|name| ContainerInfo {
                        container_id: format!("id-{}", name),
                        names: vec![format!("/{}", name)],
                    })
                    .collect(),
                ..Default::default()
            }
        }

        fn failing(mut self, name: &str) -> Self {
            self.failing.insert(format!("id-{}", name));
            self
        }

        fn slow(mut self, name: &str) -> Self {
            self.slow.insert(format!("id-{}", name));
            self
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn list_running(&self) -> Result<Vec<ContainerInfo>> {
            if self.fail_listing {
                return Err(anyhow!("daemon unavailable"));
            }
            if self.slow_listing {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Ok(self.containers.clone())
        }

        async fn inspect(&self, container_id: &str) -> Result<InspectInfo> {
            Ok(InspectInfo {
                name: format!("/{}", container_id.trim_start_matches("id-")),
                memory_limit_bytes: (512 * MIB) as i64,
            })
        }

        async fn one_shot_stats(&self, container_id: &str) -> Result<RawStats> {
            self.stats_calls.fetch_add(1, Ordering::SeqCst);

            if self.slow.contains(container_id) {
                let guard = CancelGuard::new(&self.slow_cancelled);
                tokio::time::sleep(Duration::from_secs(10)).await;
                guard.disarm();
                self.slow_finished.fetch_add(1, Ordering::SeqCst);
            }
            if self.failing.contains(container_id) {
                return Err(anyhow!("container {} vanished", container_id));
            }

            Ok(RawStats {
                id: container_id.to_string(),
                name: String::new(),
                memory: MemorySample {
                    usage_bytes: 500 * MIB,
                    max_usage_bytes: 600 * MIB,
                    cache_bytes: Some(100 * MIB),
                },
                cpu: CpuSample {
                    total_usage: 200,
                    system_usage: 1000,
                    online_cpus: 4,
                    percpu_count: 4,
                },
                precpu: CpuSample::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_collect_all_containers() {
        let runtime = Arc::new(MockRuntime::with_containers(&["shop_db_1", "shop_web_1"]));
        let collector = StatsCollectorBuilder::new()
            .runtime(runtime.clone())
            .build()
            .unwrap();

        let batch = collector.collect_with_timeout().await.unwrap();

        assert_eq!(batch.outcome, BatchOutcome::Complete);
        assert_eq!(batch.snapshots.len(), 2);
        assert!(batch.warnings.is_empty());
        assert_eq!(runtime.stats_calls.load(Ordering::SeqCst), 2);

        let db = batch
            .snapshots
            .iter()
            .find(|s| s.container_id == "id-shop_db_1")
            .unwrap();
        assert_eq!(db.container_name, "shop_db_1");
        assert_eq!(db.memory_usage_mb, 400.0);
        assert_eq!(db.memory_max_used_mb, 600.0);
        assert_eq!(db.memory_limit_mb, 512.0);
        assert!((db.cpu_usage_percent - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_batch() {
        let runtime = MockRuntime::with_containers(&["shop_db_1", "shop_web_1", "shop_cache_1"])
            .failing("shop_web_1");
        let collector = StatsCollectorBuilder::new()
            .runtime(Arc::new(runtime))
            .build()
            .unwrap();

        let batch = collector.collect_with_timeout().await.unwrap();

        assert_eq!(batch.outcome, BatchOutcome::Complete);
        assert_eq!(batch.snapshots.len(), 2);
        assert_eq!(batch.warnings.len(), 1);

        let warning = &batch.warnings[0];
        assert_eq!(warning.container_id, "id-shop_web_1");
        assert_eq!(warning.container_name, "shop_web_1");
        assert!(warning.to_string().contains("shop_web_1"));
        assert!(batch
            .snapshots
            .iter()
            .all(|s| s.container_name != "shop_web_1"));
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let runtime = MockRuntime {
            fail_listing: true,
            ..Default::default()
        };
        let collector = StatsCollectorBuilder::new()
            .runtime(Arc::new(runtime))
            .build()
            .unwrap();

        assert!(collector.collect_with_timeout().await.is_err());
    }

    #[tokio::test]
    async fn test_deadline_returns_partial_results() {
        let runtime = MockRuntime::with_containers(&["shop_db_1", "shop_web_1"]).slow("shop_web_1");
        let collector = StatsCollectorBuilder::new()
            .runtime(Arc::new(runtime))
            .build()
            .unwrap();

        let started = Instant::now();
        let batch = collector
            .collect(Instant::now() + Duration::from_millis(300))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(batch.deadline_exceeded());
        assert_eq!(batch.snapshots.len(), 1);
        assert_eq!(batch.snapshots[0].container_name, "shop_db_1");
        assert!(batch.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_configured_timeout_applies() {
        let runtime = MockRuntime::with_containers(&["shop_db_1"]).slow("shop_db_1");
        let collector = StatsCollectorBuilder::new()
            .runtime(Arc::new(runtime))
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();

        let batch = collector.collect_with_timeout().await.unwrap();
        assert_eq!(batch.outcome, BatchOutcome::DeadlineExceeded);
        assert!(batch.snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_cancels_outstanding_fetches() {
        let runtime = Arc::new(
            MockRuntime::with_containers(&["shop_db_1", "shop_web_1"]).slow("shop_web_1"),
        );
        let collector = StatsCollectorBuilder::new()
            .runtime(runtime.clone())
            .build()
            .unwrap();

        let batch = collector
            .collect(Instant::now() + Duration::from_millis(200))
            .await
            .unwrap();

        assert!(batch.deadline_exceeded());
        assert_eq!(runtime.slow_cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.slow_finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deadline_bounds_container_listing() {
        let runtime = MockRuntime {
            slow_listing: true,
            ..MockRuntime::with_containers(&["shop_db_1"])
        };
        let collector = StatsCollectorBuilder::new()
            .runtime(Arc::new(runtime))
            .build()
            .unwrap();

        let started = Instant::now();
        let batch = collector
            .collect(Instant::now() + Duration::from_millis(100))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(batch.outcome, BatchOutcome::DeadlineExceeded);
        assert!(batch.snapshots.is_empty());
        assert!(batch.warnings.is_empty());
    }
}
