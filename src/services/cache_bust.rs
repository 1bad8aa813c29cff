//! Cross-instance cache-bust notification
//!
//! After a multi-month backfill, a sibling instance may still hold a memoized
//! aggregate for the user. The hint asks it to recompute on its next request.
//! Delivery is best effort: failures are logged and dropped.

use std::time::Duration;

use crate::types::{Result, WrapError};

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 3;

/// Sends cache-bust hints for a user
pub trait CacheBuster: Send + Sync {
    fn bust(&self, user_id: &str);
}

/// Used when no sibling endpoint is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheBuster;

impl CacheBuster for NoopCacheBuster {
    fn bust(&self, user_id: &str) {
        tracing::debug!(user = user_id, "No cache-bust endpoint configured, skipping");
    }
}

/// Notifies a sibling via `GET {endpoint}/user/{user_id}?no_cache=True`
pub struct HttpCacheBuster {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpCacheBuster {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| WrapError::Config(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, user_id: &str) -> String {
        format!("{}/user/{}", self.endpoint, user_id)
    }
}

impl CacheBuster for HttpCacheBuster {
    fn bust(&self, user_id: &str) {
        let url = self.url_for(user_id);
        match self
            .client
            .get(&url)
            .query(&[("no_cache", "True")])
            .send()
        {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(user = user_id, "Sent cache-bust");
            }
            Ok(resp) => {
                tracing::warn!(user = user_id, status = %resp.status(), "Cache-bust rejected");
            }
            Err(e) => {
                tracing::warn!(user = user_id, error = %e, "Cache-bust failed");
            }
        }
    }
}

/// Resolve the configured endpoint into a notifier
pub fn from_endpoint(endpoint: Option<&str>) -> Result<Box<dyn CacheBuster>> {
    match endpoint {
        Some(url) if !url.trim().is_empty() => Ok(Box::new(HttpCacheBuster::new(url)?)),
        _ => Ok(Box::new(NoopCacheBuster)),
    }
}
