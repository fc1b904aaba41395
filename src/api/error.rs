//! Error types for the monitoring API gateway.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when calling a monitoring platform action.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Endpoint root or tenant credentials are not configured.
    #[error("api not available: endpoint root or app credentials unset")]
    ApiNotAvailable,

    /// No usable credential for the tenant.
    #[error("token not available for app `{0}`")]
    TokenNotAvailable(String),

    /// HTTP status code is not 2xx.
    #[error("http failed with status {0}")]
    HttpFailed(StatusCode),

    /// The platform answered but rejected the action.
    ///
    /// `code` is whatever the body carried under `code` (null when absent);
    /// `info` is the full body.
    #[error("action failed with code {code}")]
    ActionFailed { code: Value, info: Value },

    /// Malformed URL, transport failure or unreadable body.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The action succeeded but `data` did not have the expected shape.
    #[error("unexpected {action} payload: {reason}")]
    Decode {
        action: &'static str,
        reason: String,
    },
}

impl ApiError {
    pub fn action_failed(body: Value) -> Self {
        let code = body.get("code").cloned().unwrap_or(Value::Null);
        Self::ActionFailed { code, info: body }
    }

    pub fn network(reason: impl Into<String>) -> Self {
        Self::NetworkError(reason.into())
    }

    pub fn decode(action: &'static str, err: serde_json::Error) -> Self {
        Self::Decode {
            action,
            reason: err.to_string(),
        }
    }

    /// Short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ApiNotAvailable => "api_not_available",
            Self::TokenNotAvailable(_) => "token_not_available",
            Self::HttpFailed(_) => "http_failed",
            Self::ActionFailed { .. } => "action_failed",
            Self::NetworkError(_) => "network_error",
            Self::Decode { .. } => "decode_error",
        }
    }
}
