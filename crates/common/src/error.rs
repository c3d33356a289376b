use thiserror::Error;

/// Failure talking to the transaction-history provider.
///
/// Every variant is treated as transient by the chain fetcher: it is retried
/// and, once the retry budget is spent, the chain is reported as unavailable.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("malformed provider response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid transaction record {hash}: {reason}")]
    InvalidRecord { hash: String, reason: String },

    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),
}

impl ProviderError {
    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::RateLimited => "rate_limited",
            Self::Parse(_) => "parse",
            Self::InvalidRecord { .. } => "invalid_record",
            Self::MissingApiKey(_) => "missing_api_key",
        }
    }
}
