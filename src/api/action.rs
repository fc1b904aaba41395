//! The closed set of platform actions and their request shapes.

use serde_json::Value;

/// Platform product a gateway is rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    /// Monitoring: metric catalog and time-series queries.
    Monitor,
    /// Configuration database: business lookup.
    Cmdb,
}

impl Product {
    /// Name substituted for `{product}` in the API root template.
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Monitor => "bkmonitorv3",
            Product::Cmdb => "bkcmdb",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request parameters for a gateway call.
#[derive(Debug, Clone, Default)]
pub struct CallParams {
    /// JSON body.
    pub json: Option<Value>,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// Extra headers; the credential header is merged over these.
    pub headers: Vec<(String, String)>,
}

impl CallParams {
    pub fn json(body: Value) -> Self {
        Self {
            json: Some(body),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Every remote action the facades are allowed to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SearchBusiness,
    GetMetricList,
    TimeSeriesUnifyQuery,
}

impl Action {
    pub fn product(&self) -> Product {
        match self {
            Action::SearchBusiness => Product::Cmdb,
            Action::GetMetricList | Action::TimeSeriesUnifyQuery => Product::Monitor,
        }
    }

    /// Path appended to the product root.
    pub fn path(&self) -> &'static str {
        match self {
            Action::SearchBusiness => "api/v3/biz/search/tencent",
            Action::GetMetricList => "get_metric_list/",
            Action::TimeSeriesUnifyQuery => "time_series/unify_query/",
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Action::SearchBusiness | Action::GetMetricList | Action::TimeSeriesUnifyQuery => {
                HttpMethod::Post
            }
        }
    }

    /// Build the call parameters for this action from its payload.
    pub fn params(&self, payload: Value) -> CallParams {
        CallParams::json(payload)
    }
}
