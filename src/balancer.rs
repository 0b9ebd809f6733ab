//! Proxy balancer facade
//!
//! Wires the registry, prober, refresh scheduler, selector and stats reporter
//! around one shared registry and one injected agent factory.

use std::sync::Arc;

use tracing::info;

use crate::config::BalancerConfig;
use crate::error::Result;
use crate::models::{ProxyEntry, ProxySource, ProxyStats, StatsSummary};
use crate::proxy::agent::{AgentFactory, ReqwestAgentFactory};
use crate::proxy::health::Prober;
use crate::proxy::registry::Registry;
use crate::proxy::scheduler::{RefreshReport, RefreshScheduler};
use crate::proxy::selector::{SelectedProxy, Selector};
use crate::proxy::stats::StatsReporter;
use crate::services::{AutoRefreshConfig, AutoRefreshHandle, AutoRefreshService};

pub struct ProxyBalancer<F: AgentFactory = ReqwestAgentFactory> {
    config: BalancerConfig,
    registry: Registry,
    scheduler: Arc<RefreshScheduler<F>>,
    selector: Selector<F>,
    stats: StatsReporter,
}

impl<F: AgentFactory> std::fmt::Debug for ProxyBalancer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyBalancer")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ProxyBalancer<ReqwestAgentFactory> {
    /// Build a balancer that probes and routes through reqwest clients
    pub async fn new(source: ProxySource, config: BalancerConfig) -> Result<Self> {
        let factory = ReqwestAgentFactory::new().with_connect_timeout(config.test_timeout);
        Self::with_factory(source, config, factory).await
    }
}

impl<F: AgentFactory> ProxyBalancer<F> {
    /// Build a balancer around a custom agent factory
    ///
    /// Invalid configuration or an unloadable source fails here, before any
    /// probe is issued.
    pub async fn with_factory(
        source: ProxySource,
        config: BalancerConfig,
        factory: F,
    ) -> Result<Self> {
        config.validate()?;
        let registry = Registry::initialize(source).await?;
        Ok(Self::from_registry(registry, config, factory))
    }

    pub fn from_registry(registry: Registry, config: BalancerConfig, factory: F) -> Self {
        let factory = Arc::new(factory);
        let prober = Prober::new(factory.clone(), config.test_url.clone(), config.test_timeout);
        let scheduler = Arc::new(RefreshScheduler::new(
            registry.clone(),
            prober,
            config.concurrent_tests,
        ));
        let selector = Selector::new(registry.clone(), factory, config.max_failures);
        let stats = StatsReporter::new(registry.clone(), config.max_failures);

        info!(
            "Proxy balancer ready with {} proxies (max failures: {}, test url: {})",
            registry.len(),
            config.max_failures,
            config.test_url
        );

        Self {
            config,
            registry,
            scheduler,
            selector,
            stats,
        }
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one staggered probe cycle over every proxy
    pub async fn refresh_proxies(&self) -> RefreshReport {
        self.scheduler.refresh_all().await
    }

    /// Start refreshing on a fixed timer
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_auto_refresh(&self) -> AutoRefreshHandle {
        AutoRefreshService::new(
            self.scheduler.clone(),
            AutoRefreshConfig {
                refresh_interval: self.config.refresh_interval,
                overlap_policy: self.config.overlap_policy,
            },
        )
        .spawn()
    }

    /// Best eligible proxy with an agent ready to route through it
    pub fn get_best_proxy(&self) -> Result<SelectedProxy<F::Agent>> {
        self.selector.pick_best()
    }

    pub fn sort_by_latency(&self) -> Vec<ProxyStats> {
        to_stats(&self.selector.sort_by_latency())
    }

    pub fn failed_proxies(&self) -> Vec<ProxyStats> {
        to_stats(&self.selector.list_failed())
    }

    pub fn proxy_stats(&self) -> Vec<ProxyStats> {
        self.stats.proxy_stats()
    }

    pub fn stats_summary(&self) -> StatsSummary {
        self.stats.summary()
    }
}

fn to_stats(entries: &[ProxyEntry]) -> Vec<ProxyStats> {
    entries.iter().map(ProxyStats::from).collect()
}
