//! Shared proxy registry
//!
//! Every component holds a clone of the same [`Registry`] handle, so probes,
//! selection and stats all see one up-to-date set of entries. Positions never
//! change, which lets concurrent probes address entries by index.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::{BalancerError, Result};
use crate::models::{ProxyEntry, ProxySource};
use crate::proxy::loader;

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Arc<RwLock<Vec<ProxyEntry>>>,
}

impl Registry {
    /// Build a registry with one fresh entry per address
    ///
    /// Duplicate addresses produce duplicate entries.
    pub fn from_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_entries(addresses.into_iter().map(ProxyEntry::new).collect())
    }

    pub fn from_entries(entries: Vec<ProxyEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Build a registry from a list or a loadable file reference
    pub async fn initialize(source: ProxySource) -> Result<Self> {
        let addresses = match source {
            ProxySource::List(addresses) => {
                info!("Loading proxies from list");
                addresses
            }
            ProxySource::File(path) => {
                if path.as_os_str().is_empty() {
                    return Err(BalancerError::InvalidSource(
                        "file reference has an empty path".into(),
                    ));
                }
                if path.is_dir() {
                    return Err(BalancerError::InvalidSource(format!(
                        "{} is a directory, not a proxy list",
                        path.display()
                    )));
                }
                info!("Loading proxies from file: {}", path.display());
                loader::load_addresses(&path).await
            }
        };

        let registry = Self::from_addresses(addresses);
        info!("Loaded {} proxies", registry.len());
        Ok(registry)
    }

    /// Snapshot of the current entries
    ///
    /// Probes and the selector keep mutating the shared storage, so two calls
    /// may return different health data.
    pub fn all(&self) -> Vec<ProxyEntry> {
        self.entries.read().clone()
    }

    /// Inspect the entries in place without cloning
    pub fn read<R>(&self, f: impl FnOnce(&[ProxyEntry]) -> R) -> R {
        f(&self.entries.read())
    }

    /// Mutate one entry in a single critical section
    pub fn update<R>(&self, index: usize, f: impl FnOnce(&mut ProxyEntry) -> R) -> Option<R> {
        self.entries.write().get_mut(index).map(f)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut [ProxyEntry]) -> R) -> R {
        f(&mut self.entries.write())
    }

    pub fn address_at(&self, index: usize) -> Option<String> {
        self.entries.read().get(index).map(|e| e.address.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
