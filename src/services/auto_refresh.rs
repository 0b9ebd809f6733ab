//! Periodic proxy refresh service
//!
//! Fires a refresh cycle every `refresh_interval`. Under
//! [`OverlapPolicy::Allow`] each tick spawns a new cycle even if earlier ones
//! are still running, so a slow test target lets cycles pile up.
//! [`OverlapPolicy::SkipIfBusy`] caps in-flight cycles at one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::OverlapPolicy;
use crate::proxy::agent::AgentFactory;
use crate::proxy::scheduler::RefreshScheduler;

/// Auto-refresh service configuration
#[derive(Debug, Clone)]
pub struct AutoRefreshConfig {
    /// Period between cycle starts
    pub refresh_interval: Duration,
    /// What to do when a tick finds a cycle still running
    pub overlap_policy: OverlapPolicy,
}

pub struct AutoRefreshService<F> {
    scheduler: Arc<RefreshScheduler<F>>,
    config: AutoRefreshConfig,
    in_flight: Arc<AtomicBool>,
}

impl<F: AgentFactory> AutoRefreshService<F> {
    pub fn new(scheduler: Arc<RefreshScheduler<F>>, config: AutoRefreshConfig) -> Self {
        Self {
            scheduler,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the service on the current runtime
    pub fn spawn(self) -> AutoRefreshHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(rx).await });
        AutoRefreshHandle {
            shutdown_tx: tx,
            task,
        }
    }

    /// Run the timer loop until shutdown is signalled
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting auto refresh every {}ms (overlap: {})",
            self.config.refresh_interval.as_millis(),
            self.config.overlap_policy.as_str()
        );

        // First cycle one full period after start.
        let period = self.config.refresh_interval;
        let Some(start) = Instant::now().checked_add(period) else {
            warn!(
                "Refresh interval of {}ms is out of range, auto refresh disabled",
                period.as_millis()
            );
            return;
        };
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        // Once the handle is gone nobody can signal shutdown, so the timer
        // keeps running detached.
        let mut detached = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.start_cycle(),
                res = shutdown.changed(), if !detached => {
                    if res.is_err() {
                        debug!("Auto refresh handle dropped, running detached");
                        detached = true;
                    } else if *shutdown.borrow() {
                        info!("Auto refresh shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn start_cycle(&self) {
        if self.config.overlap_policy == OverlapPolicy::SkipIfBusy
            && self.in_flight.swap(true, Ordering::AcqRel)
        {
            debug!("Previous refresh cycle still running, skipping tick");
            return;
        }

        let scheduler = self.scheduler.clone();
        let in_flight = self.in_flight.clone();
        let policy = self.config.overlap_policy;
        tokio::spawn(async move {
            scheduler.refresh_all().await;
            if policy == OverlapPolicy::SkipIfBusy {
                in_flight.store(false, Ordering::Release);
            }
        });
    }
}

/// Handle for stopping a running auto-refresh service
///
/// Stopping only ends the timer; cycles already in flight run to completion.
/// Dropping the handle without calling [`shutdown`](Self::shutdown) leaves the
/// timer running for the life of the runtime.
pub struct AutoRefreshHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AutoRefreshHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the timer loop to exit
    pub async fn wait(self) {
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::proxy::agent::mock::{MockAgentFactory, MockBehavior};
    use crate::proxy::health::Prober;
    use crate::proxy::registry::Registry;

    fn service(
        factory: Arc<MockAgentFactory>,
        policy: OverlapPolicy,
    ) -> AutoRefreshService<MockAgentFactory> {
        let registry = Registry::from_addresses(["p0"]);
        let prober = Prober::new(factory, "https://example.com", Duration::from_secs(120));
        let scheduler = Arc::new(RefreshScheduler::new(registry, prober, 5));
        AutoRefreshService::new(
            scheduler,
            AutoRefreshConfig {
                refresh_interval: Duration::from_secs(60),
                overlap_policy: policy,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_waits_one_interval() {
        let factory = Arc::new(MockAgentFactory::new());
        let handle = service(factory.clone(), OverlapPolicy::Allow).spawn();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(factory.created_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(factory.created_count(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(factory.created_count(), 2);

        handle.shutdown();
        handle.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_overlap_starts_cycles_while_busy() {
        let factory = Arc::new(MockAgentFactory::new().with("p0", MockBehavior::ok(90_000)));
        let handle = service(factory.clone(), OverlapPolicy::Allow).spawn();

        tokio::time::sleep(Duration::from_secs(130)).await;
        assert_eq!(factory.created_count(), 2);

        handle.shutdown();
        handle.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_if_busy_drops_ticks_while_busy() {
        let factory = Arc::new(MockAgentFactory::new().with("p0", MockBehavior::ok(90_000)));
        let handle = service(factory.clone(), OverlapPolicy::SkipIfBusy).spawn();

        tokio::time::sleep(Duration::from_secs(130)).await;
        assert_eq!(factory.created_count(), 1);

        // First cycle finished at 150s, so the 180s tick runs again.
        tokio::time::sleep(Duration::from_secs(55)).await;
        assert_eq!(factory.created_count(), 2);

        handle.shutdown();
        handle.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_keeps_timer_running() {
        let factory = Arc::new(MockAgentFactory::new());
        let handle = service(factory.clone(), OverlapPolicy::Allow).spawn();
        drop(handle);

        // Paused time only advances while the runtime is idle, so a timer loop
        // that busy-polled the closed channel would never reach these ticks.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(factory.created_count(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(factory.created_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_interval_disables_timer() {
        let registry = Registry::from_addresses(["p0"]);
        let factory = Arc::new(MockAgentFactory::new());
        let prober = Prober::new(factory.clone(), "https://example.com", Duration::from_secs(5));
        let service = AutoRefreshService::new(
            Arc::new(RefreshScheduler::new(registry, prober, 5)),
            AutoRefreshConfig {
                refresh_interval: Duration::MAX,
                overlap_policy: OverlapPolicy::Allow,
            },
        );

        let handle = service.spawn();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.is_finished());
        assert_eq!(factory.created_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_timer() {
        let factory = Arc::new(MockAgentFactory::new());
        let handle = service(factory.clone(), OverlapPolicy::Allow).spawn();

        handle.shutdown();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.is_finished());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(factory.created_count(), 0);
    }
}
