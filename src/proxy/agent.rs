//! Proxy agent construction
//!
//! An agent is an HTTP client bound to one upstream proxy. The prober uses it
//! to issue test requests and the selector hands it to callers.

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{BalancerError, Result};
use crate::models::ProxyProtocol;

/// Client bound to a single proxy
#[async_trait]
pub trait ProxyAgent: Send + Sync {
    /// Issue a GET through the proxy, resolving once the full response has arrived
    async fn get(&self, url: &str) -> Result<StatusCode>;
}

/// Builds agents for proxy addresses
///
/// Construction failures (malformed address, unsupported scheme) are returned
/// as errors; the prober counts them as a failed probe.
pub trait AgentFactory: Send + Sync + 'static {
    type Agent: ProxyAgent + 'static;

    fn create_agent(&self, address: &str) -> Result<Self::Agent>;
}

/// Normalize a proxy address into a URL reqwest accepts
pub fn proxy_url(address: &str) -> Result<Url> {
    let address = address.trim();
    if address.is_empty() {
        return Err(BalancerError::InvalidProxyAddress(
            "empty proxy address".to_string(),
        ));
    }

    let protocol = ProxyProtocol::of_address(address).ok_or_else(|| {
        BalancerError::UnsupportedProtocol(
            address
                .split_once("://")
                .map(|(scheme, _)| scheme.to_string())
                .unwrap_or_default(),
        )
    })?;

    let raw = if address.contains("://") {
        address.to_string()
    } else {
        format!("{}://{}", protocol, address)
    };

    let url = Url::parse(&raw)?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(BalancerError::InvalidProxyAddress(format!(
            "missing host in {}",
            address
        )));
    }

    Ok(url)
}

/// Agent factory backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestAgentFactory {
    connect_timeout: Option<Duration>,
    user_agent: String,
}

impl ReqwestAgentFactory {
    pub fn new() -> Self {
        Self {
            connect_timeout: None,
            user_agent: concat!("proxy-balancer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

}

impl Default for ReqwestAgentFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentFactory for ReqwestAgentFactory {
    type Agent = HttpAgent;

    #[instrument(skip(self))]
    fn create_agent(&self, address: &str) -> Result<HttpAgent> {
        let url = proxy_url(address)?;
        let proxy = reqwest::Proxy::all(url.as_str())
            .map_err(|e| BalancerError::AgentCreation(format!("{}: {}", address, e)))?;

        let mut builder = reqwest::Client::builder()
            .proxy(proxy)
            .user_agent(self.user_agent.clone());
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| BalancerError::AgentCreation(format!("{}: {}", address, e)))?;

        debug!("Created agent for proxy {}", address);
        Ok(HttpAgent { client })
    }
}

/// reqwest client routed through one proxy
#[derive(Debug, Clone)]
pub struct HttpAgent {
    client: reqwest::Client,
}

impl HttpAgent {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl ProxyAgent for HttpAgent {
    async fn get(&self, url: &str) -> Result<StatusCode> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        // Drain the body so the measured time covers the complete response.
        response.bytes().await?;
        Ok(status)
    }
}
