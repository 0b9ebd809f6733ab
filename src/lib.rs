//! Proxy Balancer - latency-ranked proxy pool
//!
//! Keeps a pool of outbound proxies healthy and picks the fastest live one.
//!
//! ## Features
//!
//! - Proxy lists from an address list or a line-oriented file
//! - Periodic staggered health probes with per-probe timeouts
//! - Latency-ranked selection with failure-threshold exclusion and recovery
//! - HTTP, HTTPS and SOCKS5 upstream proxies via reqwest
//! - Pool statistics and per-proxy reports

pub mod balancer;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod proxy;
pub mod services;

pub use balancer::ProxyBalancer;
pub use config::{BalancerConfig, Config, OverlapPolicy};
pub use error::{BalancerError, Result};
pub use models::{ProxyEntry, ProxySource, ProxyStats, StatsSummary};
