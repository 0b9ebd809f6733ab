//! Latency-ranked proxy selection
//!
//! Ranking orders entries by ascending latency (unmeasured last), then by
//! ascending failure count. The sort is stable, so remaining ties keep
//! registry order. Rankings are views; the registry itself is never reordered.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::{BalancerError, Result};
use crate::models::ProxyEntry;
use crate::proxy::agent::AgentFactory;
use crate::proxy::registry::Registry;

/// Ranking comparator
pub fn compare_rank(a: &ProxyEntry, b: &ProxyEntry) -> Ordering {
    let latency = match (a.latency, b.latency) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    latency.then_with(|| a.failure_count.cmp(&b.failure_count))
}

/// Registry indices in rank order
pub fn rank_indices(entries: &[ProxyEntry]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..entries.len()).collect();
    indices.sort_by(|&a, &b| compare_rank(&entries[a], &entries[b]));
    indices
}

/// A proxy chosen for an outbound request
pub struct SelectedProxy<A> {
    pub address: String,
    pub agent: A,
}

impl<A> std::fmt::Debug for SelectedProxy<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedProxy")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

pub struct Selector<F> {
    registry: Registry,
    factory: Arc<F>,
    max_failures: u32,
}

impl<F: AgentFactory> Selector<F> {
    pub fn new(registry: Registry, factory: Arc<F>, max_failures: u32) -> Self {
        Self {
            registry,
            factory,
            max_failures,
        }
    }

    /// All entries in rank order
    pub fn ranked(&self) -> Vec<ProxyEntry> {
        self.registry.read(|entries| {
            rank_indices(entries)
                .into_iter()
                .map(|i| entries[i].clone())
                .collect()
        })
    }

    /// Choose the best eligible proxy and stamp it as used
    ///
    /// The stamp is applied before the agent is built, so it sticks even when
    /// agent creation fails.
    pub fn pick_best(&self) -> Result<SelectedProxy<F::Agent>> {
        let max_failures = self.max_failures;
        let address = self.registry.write(|entries| {
            if entries.is_empty() {
                return Err(BalancerError::NoProxiesAvailable);
            }

            let best = rank_indices(entries)
                .into_iter()
                .find(|&i| entries[i].is_eligible(max_failures))
                .ok_or(BalancerError::AllProxiesExhausted {
                    total: entries.len(),
                })?;

            let entry = &mut entries[best];
            entry.mark_used(Utc::now());
            Ok(entry.address.clone())
        })?;

        let agent = self.factory.create_agent(&address)?;
        info!("Best proxy selected: {}", address);

        Ok(SelectedProxy { address, agent })
    }

    /// Eligible proxies with a measured latency, in rank order
    pub fn sort_by_latency(&self) -> Vec<ProxyEntry> {
        self.ranked()
            .into_iter()
            .filter(|e| e.is_eligible(self.max_failures) && e.latency.is_some())
            .collect()
    }

    /// Proxies at or over the failure threshold, in registry order
    pub fn list_failed(&self) -> Vec<ProxyEntry> {
        self.registry.read(|entries| {
            entries
                .iter()
                .filter(|e| !e.is_eligible(self.max_failures))
                .cloned()
                .collect()
        })
    }
}
