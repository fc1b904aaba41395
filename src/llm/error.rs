use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited by the model endpoint")]
    RateLimited { request_id: Option<String> },

    #[error("model endpoint returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("unusable completion: {0}")]
    Malformed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Status { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Malformed(_) | Self::Config(_) => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
            Self::Http(_) => "http",
            Self::Config(_) => "config",
        }
    }
}
