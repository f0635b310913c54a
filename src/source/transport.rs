use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::{DashboardError, Result};

pub const DEFAULT_USER_AGENT: &str = concat!("pipedash/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A path on the pipeline-status API, kept as raw segments so names are encoded exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    segments: Vec<String>,
}

impl Endpoint {
    /// `GET /pipelines`
    pub fn pipelines() -> Self {
        Self {
            segments: vec!["pipelines".to_string()],
        }
    }

    /// `GET /pipeline/{name}`
    pub fn pipeline(name: &str) -> Self {
        Self {
            segments: vec!["pipeline".to_string(), name.to_string()],
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Read-only access to the pipeline-status API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads `endpoint` and returns the decoded JSON body.
    async fn get_json(&self, endpoint: &Endpoint) -> Result<Value>;
}

/// `Transport` over HTTP.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| DashboardError::Config(format!("Invalid base URL: {e}")))?;

        if base_url.cannot_be_a_base() {
            return Err(DashboardError::Config(format!(
                "Base URL cannot carry paths: {base_url}"
            )));
        }

        Ok(Self { client, base_url })
    }

    /// Appends the endpoint to the base URL, keeping any path prefix the base carries.
    fn endpoint_url(&self, endpoint: &Endpoint) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DashboardError::Config("Base URL cannot carry paths".to_string()))?
            .pop_if_empty()
            .extend(endpoint.segments());
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, endpoint: &Endpoint) -> Result<Value> {
        let url = self.endpoint_url(endpoint)?;
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| DashboardError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(DashboardError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| DashboardError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| DashboardError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}
