//! Staggered refresh of the whole registry
//!
//! Entry `i` is probed `(i % concurrent_tests) * 500ms` after the cycle starts,
//! so at most `concurrent_tests` probes start on any 500ms tick. All probes of
//! a cycle are joined on the calling task.

use std::time::Duration;

use futures::future::join_all;
use tracing::{info, instrument};

use crate::proxy::agent::AgentFactory;
use crate::proxy::health::Prober;
use crate::proxy::registry::Registry;

/// Spacing between stagger buckets
pub const STAGGER_STEP: Duration = Duration::from_millis(500);

/// Start offset of each probe in a cycle over `count` entries
pub fn stagger_offsets(count: usize, concurrent_tests: usize) -> Vec<Duration> {
    let buckets = concurrent_tests.max(1);
    (0..count)
        .map(|i| STAGGER_STEP * (i % buckets) as u32)
        .collect()
}

/// Outcome counts of one refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub passed: usize,
    pub failed: usize,
}

pub struct RefreshScheduler<F> {
    registry: Registry,
    prober: Prober<F>,
    concurrent_tests: usize,
}

impl<F: AgentFactory> RefreshScheduler<F> {
    pub fn new(registry: Registry, prober: Prober<F>, concurrent_tests: usize) -> Self {
        Self {
            registry,
            prober,
            concurrent_tests,
        }
    }

    /// Probe every entry once; completes when all probes have finished
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> RefreshReport {
        info!("Refreshing proxies...");

        let offsets = stagger_offsets(self.registry.len(), self.concurrent_tests);
        let probes = offsets.into_iter().enumerate().map(|(index, offset)| async move {
            tokio::time::sleep(offset).await;
            self.prober.probe(&self.registry, index).await
        });

        let outcomes = join_all(probes).await;

        let passed = outcomes
            .iter()
            .flatten()
            .filter(|outcome| outcome.is_passed())
            .count();
        let report = RefreshReport {
            passed,
            failed: outcomes.len() - passed,
        };

        info!(
            "Proxy refresh completed: {} passed, {} failed",
            report.passed, report.failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::time::Instant;

    use crate::proxy::agent::mock::{MockAgentFactory, MockBehavior};

    fn scheduler(
        registry: &Registry,
        factory: Arc<MockAgentFactory>,
        concurrent_tests: usize,
    ) -> RefreshScheduler<MockAgentFactory> {
        let prober = Prober::new(factory, "https://example.com", Duration::from_secs(5));
        RefreshScheduler::new(registry.clone(), prober, concurrent_tests)
    }

    #[test]
    fn test_stagger_offsets() {
        let ms = |v: Vec<Duration>| v.iter().map(|d| d.as_millis()).collect::<Vec<_>>();

        assert_eq!(ms(stagger_offsets(5, 2)), vec![0, 500, 0, 500, 0]);
        assert_eq!(ms(stagger_offsets(4, 5)), vec![0, 500, 1000, 1500]);
        assert_eq!(ms(stagger_offsets(3, 0)), vec![0, 0, 0]);
        assert!(stagger_offsets(0, 5).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_all_staggers_probe_starts() {
        let registry = Registry::from_addresses(["p0", "p1", "p2", "p3", "p4"]);
        let factory = Arc::new(MockAgentFactory::new());
        let scheduler = scheduler(&registry, factory.clone(), 2);

        let start = Instant::now();
        scheduler.refresh_all().await;

        let mut offsets: Vec<(String, u128)> = factory
            .created()
            .into_iter()
            .map(|(address, at)| (address, (at - start).as_millis()))
            .collect();
        offsets.sort();

        assert_eq!(
            offsets,
            vec![
                ("p0".to_string(), 0),
                ("p1".to_string(), 500),
                ("p2".to_string(), 0),
                ("p3".to_string(), 500),
                ("p4".to_string(), 0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_all_waits_for_every_probe_and_never_fails() {
        let registry = Registry::from_addresses(["fast", "slow", "broken", "rejected"]);
        let factory = Arc::new(
            MockAgentFactory::new()
                .with("fast", MockBehavior::ok(20))
                .with("slow", MockBehavior::ok(3000))
                .with("broken", MockBehavior::status(502))
                .with("rejected", MockBehavior::RejectAgent),
        );
        let scheduler = scheduler(&registry, factory, 5);

        let report = scheduler.refresh_all().await;
        assert_eq!(report, RefreshReport { passed: 2, failed: 2 });

        let entries = registry.all();
        assert_eq!(entries[0].latency_ms(), Some(20));
        assert_eq!(entries[1].latency_ms(), Some(3000));
        assert_eq!(entries[2].failure_count, 1);
        assert_eq!(entries[3].failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_all_on_empty_registry() {
        let registry = Registry::default();
        let scheduler = scheduler(&registry, Arc::new(MockAgentFactory::new()), 5);
        assert_eq!(scheduler.refresh_all().await, RefreshReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_proxy_recovers_on_next_cycle() {
        let registry = Registry::from_addresses(["flaky"]);
        let factory = Arc::new(MockAgentFactory::new().with("flaky", MockBehavior::status(503)));
        let scheduler = scheduler(&registry, factory.clone(), 5);

        for _ in 0..3 {
            scheduler.refresh_all().await;
        }
        assert_eq!(registry.all()[0].failure_count, 3);

        factory.set("flaky", MockBehavior::ok(75));
        scheduler.refresh_all().await;

        let entry = &registry.all()[0];
        assert_eq!(entry.failure_count, 0);
        assert_eq!(entry.latency_ms(), Some(75));
    }
}
