//! Configuration module
//!
//! Balancer, source and logging settings, loaded from environment variables.

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{BalancerError, Result};
use crate::models::ProxySource;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Pool behaviour
    pub balancer: BalancerConfig,
    /// Where the initial proxy list comes from, if set in the environment
    pub source: Option<ProxySource>,
    /// Logging configuration
    pub log: LogConfig,
}

/// How the auto-refresh timer treats a cycle that is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Start a new cycle on every tick regardless of in-flight cycles
    #[default]
    Allow,
    /// Skip the tick while a previous cycle is still running
    SkipIfBusy,
}

impl OverlapPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "allow" | "overlap" => Some(Self::Allow),
            "skip" | "skip_if_busy" | "skip-if-busy" => Some(Self::SkipIfBusy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::SkipIfBusy => "skip_if_busy",
        }
    }
}

/// Longest accepted auto-refresh period (30 days)
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancerConfig {
    /// Failure count at which a proxy stops being eligible (default: 3)
    pub max_failures: u32,
    /// Per-probe timeout (default: 5s)
    pub test_timeout: Duration,
    /// Period between auto-refresh cycles (default: 60s)
    pub refresh_interval: Duration,
    /// Stagger bucket width for refresh cycles (default: 5)
    pub concurrent_tests: usize,
    /// Probe target
    pub test_url: String,
    /// Auto-refresh overlap handling
    pub overlap_policy: OverlapPolicy,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            test_timeout: Duration::from_millis(5000),
            refresh_interval: Duration::from_millis(60000),
            concurrent_tests: 5,
            test_url: "https://example.com".to_string(),
            overlap_policy: OverlapPolicy::Allow,
        }
    }
}

impl BalancerConfig {
    /// Reject settings the pool cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.max_failures == 0 {
            return Err(BalancerError::InvalidConfig(
                "max_failures must be at least 1".into(),
            ));
        }
        if self.test_timeout.is_zero() {
            return Err(BalancerError::InvalidConfig(
                "test_timeout must be greater than zero".into(),
            ));
        }
        if self.refresh_interval.is_zero() {
            return Err(BalancerError::InvalidConfig(
                "refresh_interval must be greater than zero".into(),
            ));
        }
        if self.refresh_interval > MAX_REFRESH_INTERVAL {
            return Err(BalancerError::InvalidConfig(format!(
                "refresh_interval must not exceed {}ms",
                MAX_REFRESH_INTERVAL.as_millis()
            )));
        }

        let url = Url::parse(&self.test_url).map_err(|e| {
            BalancerError::InvalidConfig(format!("test_url must be a valid URL: {}", e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BalancerError::InvalidConfig(format!(
                "test_url has unsupported scheme: {}",
                url.scheme()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
    /// File that log lines are appended to, if any
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: Some("proxy.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let balancer = BalancerConfig {
            max_failures: parse_env("PROXY_MAX_FAILURES", "3")?,
            test_timeout: Duration::from_millis(parse_env("PROXY_TEST_TIMEOUT_MS", "5000")?),
            refresh_interval: Duration::from_millis(parse_env(
                "PROXY_REFRESH_INTERVAL_MS",
                "60000",
            )?),
            concurrent_tests: parse_env("PROXY_CONCURRENT_TESTS", "5")?,
            test_url: get_env_or("PROXY_TEST_URL", "https://example.com"),
            overlap_policy: {
                let raw = get_env_or("PROXY_REFRESH_OVERLAP", "allow");
                OverlapPolicy::from_str(&raw).ok_or_else(|| {
                    BalancerError::InvalidConfig(format!(
                        "PROXY_REFRESH_OVERLAP must be 'allow' or 'skip', got '{}'",
                        raw
                    ))
                })?
            },
        };
        balancer.validate()?;

        let source = match env::var("PROXY_SOURCE") {
            Ok(raw) if !raw.trim().is_empty() => Some(ProxySource::parse(&raw)?),
            _ => None,
        };

        let file = get_env_or("LOG_FILE", "proxy.log");

        Ok(Config {
            balancer,
            source,
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
                file: if file.trim().is_empty() {
                    None
                } else {
                    Some(file)
                },
            },
        })
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| BalancerError::InvalidConfig(format!("{} must be a valid number", key)))
}
