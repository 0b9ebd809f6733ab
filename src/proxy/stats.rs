//! Read-only pool statistics

use crate::models::{ProxyStats, StatsSummary};
use crate::proxy::registry::Registry;

pub struct StatsReporter {
    registry: Registry,
    max_failures: u32,
}

impl StatsReporter {
    pub fn new(registry: Registry, max_failures: u32) -> Self {
        Self {
            registry,
            max_failures,
        }
    }

    /// Pool-wide counts and average latency
    ///
    /// The average runs over active proxies only, and an active proxy without
    /// a measurement contributes 0 to the sum. This understates the mean while
    /// proxies are still unprobed.
    pub fn summary(&self) -> StatsSummary {
        self.registry.read(|entries| {
            let total = entries.len();
            let active: Vec<_> = entries
                .iter()
                .filter(|e| e.is_eligible(self.max_failures))
                .collect();

            let avg_latency_ms = if active.is_empty() {
                None
            } else {
                let sum: u128 = active
                    .iter()
                    .map(|e| e.latency.map_or(0, |l| l.as_millis()))
                    .sum();
                Some((sum as f64 / active.len() as f64).round() as u64)
            };

            StatsSummary {
                total,
                active: active.len(),
                failed: total - active.len(),
                avg_latency_ms,
            }
        })
    }

    /// One report row per proxy, in registry order
    pub fn proxy_stats(&self) -> Vec<ProxyStats> {
        self.registry
            .read(|entries| entries.iter().map(ProxyStats::from).collect())
    }
}
