use std::time::Duration;

use thiserror::Error;

/// Unified error type for the proxy balancer
#[derive(Error, Debug)]
pub enum BalancerError {
    // Setup errors
    #[error("Invalid proxy source: {0}")]
    InvalidSource(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Selection errors
    #[error("No proxies available")]
    NoProxiesAvailable,

    #[error("All {total} proxies have exceeded the max failure threshold")]
    AllProxiesExhausted { total: usize },

    // Agent errors
    #[error("Failed to create proxy agent: {0}")]
    AgentCreation(String),

    #[error("Invalid proxy address: {0}")]
    InvalidProxyAddress(String),

    #[error("Unsupported proxy protocol: {0}")]
    UnsupportedProtocol(String),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for balancer operations
pub type Result<T> = std::result::Result<T, BalancerError>;

impl BalancerError {
    /// Errors a caller of selection has to handle explicitly
    pub fn is_selection_error(&self) -> bool {
        matches!(
            self,
            BalancerError::NoProxiesAvailable | BalancerError::AllProxiesExhausted { .. }
        )
    }

    /// Errors that abort setup before any probing begins
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            BalancerError::InvalidSource(_) | BalancerError::InvalidConfig(_)
        )
    }
}

impl From<reqwest::Error> for BalancerError {
    fn from(err: reqwest::Error) -> Self {
        BalancerError::Http(err.to_string())
    }
}

impl From<url::ParseError> for BalancerError {
    fn from(err: url::ParseError) -> Self {
        BalancerError::InvalidProxyAddress(err.to_string())
    }
}

/// Reason a single probe did not pass
///
/// Never leaves the prober; it only shows up as a failure count and a log line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("proxy failed with status: {0}")]
    Status(u16),

    #[error("no response received within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("agent creation failed: {0}")]
    AgentCreation(String),
}
