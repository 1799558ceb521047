//! Error taxonomy shared by the fetcher, the engines and the cache gate.

pub type InsightsResult<T> = Result<T, InsightsError>;

#[derive(Debug, thiserror::Error)]
pub enum InsightsError {
    /// Channel or video absent upstream.
    #[error("{0}")]
    NotFound(String),

    /// Non-success upstream status or a transport failure.
    #[error("{message}")]
    Fetch { status: Option<u16>, message: String },

    /// Analytics requested over an empty video set.
    #[error("no videos found for channel")]
    NoData,

    /// Cached payload could not be parsed. Recovered as a cache miss.
    #[error("failed to decode cached snapshot: {0}")]
    Decode(String),

    /// Malformed input that could not be recovered with defaults.
    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl InsightsError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fetch {
            status,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Flattens an `anyhow` chain from the store into a storage error.
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    /// Upstream status carried by a fetch error, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}
