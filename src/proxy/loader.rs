//! Proxy list loading
//!
//! Reads one address per line. Blank lines and `#` comments are skipped.

use std::path::Path;

use tracing::{debug, warn};

/// Extract proxy addresses from list contents
pub fn parse_addresses(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load proxy addresses from a file
///
/// A file that cannot be read yields an empty list; the error is only logged.
pub async fn load_addresses(path: impl AsRef<Path>) -> Vec<String> {
    let path = path.as_ref();
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let addresses = parse_addresses(&contents);
            debug!("Read {} proxies from {}", addresses.len(), path.display());
            addresses
        }
        Err(e) => {
            warn!("Error reading proxy file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
