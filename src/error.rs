use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API request to {endpoint} failed with status {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DashboardError {
    /// Endpoint the failing request was addressed to, if the error came from a fetch.
    #[cfg(test)]
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Api { endpoint, .. }
            | Self::Decode { endpoint, .. } => Some(endpoint),
            Self::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
