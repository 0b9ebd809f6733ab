use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use super::ProxyEntry;

/// Per-proxy report row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyStats {
    pub address: String,
    pub latency_ms: Option<u64>,
    pub failures: u32,
    pub last_used: Option<DateTime<Utc>>,
}

impl ProxyStats {
    /// `"<n> ms"`, or `"N/A"` without a measurement
    pub fn latency_label(&self) -> String {
        match self.latency_ms {
            Some(ms) => format!("{} ms", ms),
            None => "N/A".to_string(),
        }
    }

    pub fn last_used_label(&self) -> String {
        match self.last_used {
            Some(at) => at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => "Never used".to_string(),
        }
    }
}

impl From<&ProxyEntry> for ProxyStats {
    fn from(entry: &ProxyEntry) -> Self {
        ProxyStats {
            address: entry.address.clone(),
            latency_ms: entry.latency_ms(),
            failures: entry.failure_count,
            last_used: entry.last_used_at,
        }
    }
}

impl std::fmt::Display for ProxyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} latency={} failures={} last_used={}",
            self.address,
            self.latency_label(),
            self.failures,
            self.last_used_label()
        )
    }
}

/// Pool-wide counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub total: usize,
    pub active: usize,
    pub failed: usize,
    /// Rounded mean over active proxies; `None` when nothing is active
    pub avg_latency_ms: Option<u64>,
}

impl StatsSummary {
    pub fn avg_latency_label(&self) -> String {
        match self.avg_latency_ms {
            Some(ms) => format!("{} ms", ms),
            None => "N/A".to_string(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total={} active={} failed={} avg_latency={}",
            self.total,
            self.active,
            self.failed,
            self.avg_latency_label()
        )
    }
}
