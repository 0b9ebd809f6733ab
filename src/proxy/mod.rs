//! Proxy pool core
//!
//! This module provides the pool functionality including:
//! - A shared registry of proxy entries and their health state
//! - Single-request health probes through each proxy
//! - Staggered refresh cycles over the whole registry
//! - Latency-ranked selection with failure-threshold exclusion
//! - Read-only statistics

pub mod agent;
pub mod health;
pub mod loader;
pub mod registry;
pub mod scheduler;
pub mod selector;
pub mod stats;

pub use agent::{AgentFactory, HttpAgent, ProxyAgent, ReqwestAgentFactory};
pub use health::{ProbeOutcome, Prober};
pub use registry::Registry;
pub use scheduler::{RefreshReport, RefreshScheduler};
pub use selector::{SelectedProxy, Selector};
pub use stats::StatsReporter;
