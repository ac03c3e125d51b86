use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("Malformed response from {endpoint}: {detail}")]
    Malformed {
        endpoint: &'static str,
        detail: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SearchError {
    /// Network failures and non-2xx responses. Only these are worth retrying.
    pub fn is_transport(&self) -> bool {
        matches!(self, SearchError::Transport(_) | SearchError::Status { .. })
    }

    pub(crate) fn malformed(endpoint: &'static str, detail: impl Into<String>) -> Self {
        SearchError::Malformed {
            endpoint,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
