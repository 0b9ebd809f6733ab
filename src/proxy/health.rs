//! Health probing for upstream proxies
//!
//! A probe sends one GET through a proxy and records the outcome on that
//! proxy's registry entry. Probes never fail outward: every error becomes a
//! failure count and a log line.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, instrument};

use crate::error::ProbeFailure;
use crate::proxy::agent::{AgentFactory, ProxyAgent};
use crate::proxy::registry::Registry;

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Passed { latency: Duration },
    Failed(ProbeFailure),
}

impl ProbeOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ProbeOutcome::Passed { .. })
    }
}

/// Issues test requests through proxies
pub struct Prober<F> {
    factory: Arc<F>,
    test_url: String,
    test_timeout: Duration,
}

impl<F: AgentFactory> Prober<F> {
    pub fn new(factory: Arc<F>, test_url: impl Into<String>, test_timeout: Duration) -> Self {
        Self {
            factory,
            test_url: test_url.into(),
            test_timeout,
        }
    }

    /// Probe one address without touching any registry
    ///
    /// Latency is measured from before agent creation until the response
    /// body has been received.
    pub async fn check(&self, address: &str) -> ProbeOutcome {
        debug!("Testing proxy: {}", address);
        let start = Instant::now();

        let agent = match self.factory.create_agent(address) {
            Ok(agent) => agent,
            Err(e) => return ProbeOutcome::Failed(ProbeFailure::AgentCreation(e.to_string())),
        };

        match timeout(self.test_timeout, agent.get(&self.test_url)).await {
            Ok(Ok(status)) if status == StatusCode::OK => ProbeOutcome::Passed {
                latency: start.elapsed(),
            },
            Ok(Ok(status)) => ProbeOutcome::Failed(ProbeFailure::Status(status.as_u16())),
            Ok(Err(e)) => ProbeOutcome::Failed(ProbeFailure::Transport(e.to_string())),
            Err(_) => ProbeOutcome::Failed(ProbeFailure::Timeout(self.test_timeout)),
        }
    }

    /// Probe the entry at `index` and record the outcome on it
    ///
    /// Returns `None` only when the index is out of range.
    #[instrument(skip(self, registry))]
    pub async fn probe(&self, registry: &Registry, index: usize) -> Option<ProbeOutcome> {
        let address = registry.address_at(index)?;
        let outcome = self.check(&address).await;

        match &outcome {
            ProbeOutcome::Passed { latency } => {
                registry.update(index, |entry| entry.record_success(*latency));
                info!(
                    "Proxy {} passed with latency: {}ms",
                    address,
                    latency.as_millis()
                );
            }
            ProbeOutcome::Failed(reason) => {
                let failures = registry.update(index, |entry| {
                    entry.record_failure();
                    entry.failure_count
                });
                error!(
                    "Proxy {} failed. Errors: {}. Reason: {}",
                    address,
                    failures.unwrap_or_default(),
                    reason
                );
            }
        }

        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::agent::mock::{MockAgentFactory, MockBehavior};

    const TEST_URL: &str = "https://example.com";

    fn prober(factory: MockAgentFactory) -> Prober<MockAgentFactory> {
        Prober::new(Arc::new(factory), TEST_URL, Duration::from_millis(5000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_records_latency_and_resets_failures() {
        let registry = Registry::from_addresses(["a:1"]);
        registry.update(0, |e| e.failure_count = 2);

        let prober = prober(MockAgentFactory::new().with("a:1", MockBehavior::ok(120)));
        let outcome = prober.probe(&registry, 0).await.unwrap();

        assert_eq!(
            outcome,
            ProbeOutcome::Passed {
                latency: Duration::from_millis(120)
            }
        );
        let entry = &registry.all()[0];
        assert_eq!(entry.failure_count, 0);
        assert_eq!(entry.latency_ms(), Some(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_200_status_is_failure() {
        let registry = Registry::from_addresses(["a:1"]);
        registry.update(0, |e| e.record_success(Duration::from_millis(40)));

        let prober = prober(MockAgentFactory::new().with("a:1", MockBehavior::status(204)));
        let outcome = prober.probe(&registry, 0).await.unwrap();

        assert_eq!(outcome, ProbeOutcome::Failed(ProbeFailure::Status(204)));
        let entry = &registry.all()[0];
        assert_eq!(entry.failure_count, 1);
        assert_eq!(entry.latency, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_failure() {
        let registry = Registry::from_addresses(["slow:1"]);
        let prober = prober(MockAgentFactory::new().with("slow:1", MockBehavior::ok(6000)));

        let outcome = prober.probe(&registry, 0).await.unwrap();
        assert_eq!(
            outcome,
            ProbeOutcome::Failed(ProbeFailure::Timeout(Duration::from_millis(5000)))
        );
        assert_eq!(registry.all()[0].failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_and_agent_errors_are_failures() {
        let registry = Registry::from_addresses(["reset:1", "bad"]);
        registry.update(0, |e| e.failure_count = 4);

        let prober = prober(
            MockAgentFactory::new()
                .with(
                    "reset:1",
                    MockBehavior::Transport {
                        delay: Duration::from_millis(10),
                    },
                )
                .with("bad", MockBehavior::RejectAgent),
        );

        let first = prober.probe(&registry, 0).await.unwrap();
        assert!(matches!(first, ProbeOutcome::Failed(ProbeFailure::Transport(_))));

        let second = prober.probe(&registry, 1).await.unwrap();
        assert!(matches!(
            second,
            ProbeOutcome::Failed(ProbeFailure::AgentCreation(_))
        ));

        let entries = registry.all();
        assert_eq!(entries[0].failure_count, 5);
        assert_eq!(entries[1].failure_count, 1);
        assert!(entries.iter().all(|e| e.latency.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_request_per_probe() {
        let registry = Registry::from_addresses(["a:1"]);
        let factory = Arc::new(MockAgentFactory::new().with("a:1", MockBehavior::status(500)));
        let prober = Prober::new(factory.clone(), TEST_URL, Duration::from_secs(1));

        prober.probe(&registry, 0).await;
        assert_eq!(factory.created_count(), 1);
    }

    #[tokio::test]
    async fn test_probe_out_of_range_index() {
        let registry = Registry::from_addresses(["a:1"]);
        let prober = prober(MockAgentFactory::new());
        assert!(prober.probe(&registry, 3).await.is_none());
    }
}
