//! Configuration-database facade: business lookup.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::action::Action;
use super::client::ApiGateway;
use super::error::ApiError;

/// One business record; fields vary by deployment so they are kept as a map.
pub type BusinessRecord = Map<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessSearch {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub info: Vec<BusinessRecord>,
}

impl BusinessSearch {
    pub fn first(&self) -> Option<&BusinessRecord> {
        self.info.first()
    }
}

#[derive(Debug, Clone)]
pub struct Cmdb {
    api: ApiGateway,
}

impl Cmdb {
    pub fn new(api: ApiGateway) -> Self {
        Self { api }
    }

    /// Search businesses matching `condition`, e.g. `{"bk_biz_id": 2}`.
    /// Empty results are returned as-is.
    pub async fn search_business(&self, condition: Value) -> Result<BusinessSearch, ApiError> {
        let data = self
            .api
            .invoke(Action::SearchBusiness, json!({ "condition": condition }))
            .await?;
        serde_json::from_value(data).map_err(|e| ApiError::decode("search_business", e))
    }

    /// Look up a single business by id.
    pub async fn business_by_id(&self, bk_biz_id: i64) -> Result<BusinessSearch, ApiError> {
        self.search_business(json!({ "bk_biz_id": bk_biz_id })).await
    }
}
