//! Generic action-based HTTP gateway for the monitoring platform.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, error};

use super::action::{Action, CallParams, HttpMethod};
use super::credential::{Credential, CredentialCache, DEFAULT_USERNAME};
use super::error::ApiError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway rooted at one product endpoint.
///
/// Any action name is appended to the root; the body is interpreted with the
/// platform's `result` / `code` / `status` convention.
#[derive(Debug, Clone)]
pub struct ApiGateway {
    client: reqwest::Client,
    api_root: String,
    app_code: String,
    app_secret: String,
    username: String,
    credentials: Arc<CredentialCache>,
}

impl ApiGateway {
    pub fn new(
        api_root: impl Into<String>,
        app_code: impl Into<String>,
        app_secret: impl Into<String>,
        credentials: Arc<CredentialCache>,
    ) -> Result<Self, ApiError> {
        Self::with_config(
            api_root,
            app_code,
            app_secret,
            DEFAULT_USERNAME,
            DEFAULT_TIMEOUT,
            credentials,
        )
    }

    pub fn with_config(
        api_root: impl Into<String>,
        app_code: impl Into<String>,
        app_secret: impl Into<String>,
        username: impl Into<String>,
        timeout: Duration,
        credentials: Arc<CredentialCache>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::network(format!("failed to create HTTP client: {e}")))?;

        let gateway = Self {
            client,
            api_root: api_root.into(),
            app_code: app_code.into(),
            app_secret: app_secret.into(),
            username: username.into(),
            credentials,
        };

        // Warm the cache so later gateways for the same app reuse the entry.
        if gateway.is_available() {
            gateway.credential();
        }

        Ok(gateway)
    }

    /// Endpoint root and app credentials are all set.
    pub fn is_available(&self) -> bool {
        !self.api_root.is_empty() && !self.app_code.is_empty() && !self.app_secret.is_empty()
    }

    fn credential(&self) -> Credential {
        self.credentials
            .resolve(&self.app_code, &self.app_secret, &self.username)
    }

    fn auth_headers(&self, extra: &[(String, String)]) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        for (name, value) in extra {
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(n, v);
            }
        }

        let credential = self.credential();
        let value = HeaderValue::from_str(credential.header_value())
            .map_err(|_| ApiError::TokenNotAvailable(self.app_code.clone()))?;
        headers.insert(HeaderName::from_static(credential.header_name()), value);
        Ok(headers)
    }

    /// Call `action` relative to the API root.
    pub async fn call(
        &self,
        action: &str,
        method: HttpMethod,
        params: CallParams,
    ) -> Result<Value, ApiError> {
        if !self.is_available() {
            return Err(ApiError::ApiNotAvailable);
        }

        let headers = self.auth_headers(&params.headers)?;

        let url = format!("{}/{}", self.api_root.trim_end_matches('/'), action);
        let url = reqwest::Url::parse(&url)
            .map_err(|_| ApiError::network("API root url invalid"))?;

        debug!(%url, ?method, "calling platform action");

        let mut request = self
            .client
            .request(method.into(), url)
            .headers(headers);
        if !params.query.is_empty() {
            request = request.query(&params.query);
        }
        if let Some(body) = &params.json {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            ApiError::network(format!("HTTP request failed with client error: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpFailed(status));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("failed to read response body: {e}")))?;

        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        Self::handle_result(action, body)
    }

    /// Invoke one of the known platform actions.
    pub async fn invoke(&self, action: Action, payload: Value) -> Result<Value, ApiError> {
        self.call(action.path(), action.method(), action.params(payload))
            .await
    }

    /// Success when `result` is true, or `code` is 0, or `status` is 0;
    /// the first match wins and `data` is returned.
    pub fn handle_result(action: &str, body: Value) -> Result<Value, ApiError> {
        let ok = body.get("result").and_then(Value::as_bool) == Some(true)
            || is_zero(body.get("code"))
            || is_zero(body.get("status"));

        if ok {
            return Ok(body.get("data").cloned().unwrap_or(Value::Null));
        }

        error!(action, body = %body, "platform action failed");
        Err(ApiError::action_failed(body))
    }
}

fn is_zero(v: Option<&Value>) -> bool {
    v.and_then(Value::as_f64) == Some(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_true_returns_data() {
        let data = ApiGateway::handle_result("a", json!({"result": true, "data": [1, 2]})).unwrap();
        assert_eq!(data, json!([1, 2]));
    }

    #[test]
    fn code_zero_or_status_zero_returns_data() {
        let data =
            ApiGateway::handle_result("a", json!({"result": false, "code": 0, "data": "x"})).unwrap();
        assert_eq!(data, json!("x"));

        let data = ApiGateway::handle_result("a", json!({"status": 0, "data": {"k": 1}})).unwrap();
        assert_eq!(data, json!({"k": 1}));
    }

    #[test]
    fn missing_data_is_null() {
        let data = ApiGateway::handle_result("a", json!({"result": true})).unwrap();
        assert_eq!(data, Value::Null);
    }

    #[test]
    fn everything_else_is_action_failed() {
        let body = json!({"result": false, "code": 9900403, "message": "forbidden"});
        let err = ApiGateway::handle_result("a", body.clone()).unwrap_err();
        match err {
            ApiError::ActionFailed { code, info } => {
                assert_eq!(code, json!(9900403));
                assert_eq!(info, body);
            }
            other => panic!("expected ActionFailed, got {other:?}"),
        }
    }

    #[test]
    fn non_object_body_is_action_failed() {
        let err = ApiGateway::handle_result("a", json!("<html>")).unwrap_err();
        assert!(matches!(err, ApiError::ActionFailed { .. }));
    }

    #[tokio::test]
    async fn unset_credentials_fail_before_any_io() {
        let cache = Arc::new(CredentialCache::new());
        let gw = ApiGateway::new("http://127.0.0.1:1", "", "", cache.clone()).unwrap();
        let err = gw
            .call("anything", HttpMethod::Get, CallParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ApiNotAvailable));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalid_root_is_network_error() {
        let cache = Arc::new(CredentialCache::new());
        let gw = ApiGateway::new("not a url", "app", "secret", cache).unwrap();
        let err = gw
            .call("x", HttpMethod::Post, CallParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NetworkError(_)));
    }

    #[tokio::test]
    async fn unencodable_credential_is_token_not_available() {
        let cache = Arc::new(CredentialCache::new());
        let gw = ApiGateway::new("http://127.0.0.1:1", "app", "sécret", cache).unwrap();
        let err = gw
            .call("x", HttpMethod::Post, CallParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::TokenNotAvailable(_)));
    }
}
