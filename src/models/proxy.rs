use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BalancerError, Result};

/// Proxy protocol type, taken from the scheme of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks4,
    Socks4a,
    Socks5,
    Socks5h,
}

impl ProxyProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks4 => "socks4",
            ProxyProtocol::Socks4a => "socks4a",
            ProxyProtocol::Socks5 => "socks5",
            ProxyProtocol::Socks5h => "socks5h",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(ProxyProtocol::Http),
            "https" => Some(ProxyProtocol::Https),
            "socks4" => Some(ProxyProtocol::Socks4),
            "socks4a" => Some(ProxyProtocol::Socks4a),
            "socks5" => Some(ProxyProtocol::Socks5),
            "socks5h" => Some(ProxyProtocol::Socks5h),
            _ => None,
        }
    }

    /// Protocol of an address; bare `host:port` addresses are plain HTTP proxies
    pub fn of_address(address: &str) -> Option<Self> {
        match address.split_once("://") {
            Some((scheme, _)) => Self::from_str(scheme),
            None => Some(ProxyProtocol::Http),
        }
    }
}

impl std::fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One managed proxy candidate and its health bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyEntry {
    /// Connection string, never changed after creation
    pub address: String,
    /// Round-trip time of the last successful probe; `None` when there is no data
    pub latency: Option<Duration>,
    /// Probes failed since the last success
    pub failure_count: u32,
    /// When the selector last handed this proxy out
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ProxyEntry {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            latency: None,
            failure_count: 0,
            last_used_at: None,
        }
    }

    /// Apply a passed probe
    pub fn record_success(&mut self, latency: Duration) {
        self.latency = Some(latency);
        self.failure_count = 0;
    }

    /// Apply a failed probe; the previous latency is no longer trusted
    pub fn record_failure(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.latency = None;
    }

    /// Whether the entry is still under the failure threshold
    pub fn is_eligible(&self, max_failures: u32) -> bool {
        self.failure_count < max_failures
    }

    pub fn mark_used(&mut self, at: DateTime<Utc>) {
        self.last_used_at = Some(at);
    }

    /// Latency in whole milliseconds
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency.map(|l| l.as_millis() as u64)
    }
}

/// Where the initial proxy list comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxySource {
    /// Addresses given directly
    List(Vec<String>),
    /// Line-oriented file with one address per line
    File(PathBuf),
}

impl ProxySource {
    /// Parse a textual source: `file:<path>` or a comma-separated address list
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BalancerError::InvalidSource(
                "source must be a file reference or a list of addresses".into(),
            ));
        }

        if let Some(path) = raw.strip_prefix("file:") {
            let path = path.trim();
            if path.is_empty() {
                return Err(BalancerError::InvalidSource(
                    "file reference has an empty path".into(),
                ));
            }
            return Ok(ProxySource::File(PathBuf::from(path)));
        }

        Ok(ProxySource::List(
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ))
    }
}

impl From<Vec<String>> for ProxySource {
    fn from(addresses: Vec<String>) -> Self {
        ProxySource::List(addresses)
    }
}

impl From<PathBuf> for ProxySource {
    fn from(path: PathBuf) -> Self {
        ProxySource::File(path)
    }
}
