//! Monitoring facade: metric catalog and time-series queries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::Action;
use super::client::ApiGateway;
use super::error::ApiError;

// =============================================================================
// Catalog
// =============================================================================

/// Filter condition for the metric list, e.g. `{key: "query", value: "cpu"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub value: String,
}

impl Condition {
    pub fn query(value: impl Into<String>) -> Self {
        Self {
            key: "query".to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricListRequest {
    pub conditions: Vec<Condition>,
    pub data_type_label: String,
    pub tag: String,
    pub page: u32,
    pub page_size: u32,
    pub bk_biz_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A catalog entry as returned upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMetric {
    pub id: i64,
    pub name: String,
    pub metric_field: String,
    pub result_table_id: String,
    #[serde(default)]
    pub metric_field_name: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricList {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub metric_list: Vec<RawMetric>,
}

// =============================================================================
// Time series
// =============================================================================

/// One metric/aggregation pair inside a query config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetric {
    pub field: String,
    pub method: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub data_source_label: String,
    pub data_type_label: String,
    pub metrics: Vec<QueryMetric>,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
}

impl QueryConfig {
    /// Single-metric config with alias `a`.
    pub fn single(field: &str, method: &str, table: &str) -> Self {
        Self {
            data_source_label: "bk_monitor".to_string(),
            data_type_label: "time_series".to_string(),
            metrics: vec![QueryMetric {
                field: field.to_string(),
                method: method.to_string(),
                alias: "a".to_string(),
            }],
            table: table.to_string(),
            group_by: None,
        }
    }

    pub fn group_by(mut self, dims: Vec<String>) -> Self {
        self.group_by = Some(dims);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifyQueryRequest {
    pub bk_biz_id: i64,
    pub query_configs: Vec<QueryConfig>,
    pub expression: String,
    pub start_time: i64,
    pub end_time: i64,
}

/// `[value, epoch_ms]` as sent upstream. `value` is kept as raw JSON so
/// integers stay integers when written back out; fractional epochs are
/// truncated to whole milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Value, f64)")]
pub struct Datapoint(pub Value, pub i64);

impl From<(Value, f64)> for Datapoint {
    fn from((value, epoch_ms): (Value, f64)) -> Self {
        Self(value, epoch_ms.trunc() as i64)
    }
}

impl Datapoint {
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn epoch_ms(&self) -> i64 {
        self.1
    }
}

fn default_chart_type() -> String {
    "line".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub target: String,
    pub datapoints: Vec<Datapoint>,
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "type", default = "default_chart_type")]
    pub chart_type: String,
}

/// Metric metadata that accompanies each series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMetric {
    #[serde(default)]
    pub result_table_id: String,
    #[serde(default)]
    pub metric_field_name: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

/// Parsed unify-query payload. `series[i]` belongs to `metrics[i]`.
#[derive(Debug, Clone, Deserialize)]
pub struct UnifyQueryResponse {
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub metrics: Vec<SeriesMetric>,
}

/// A series together with the metric it was produced for.
#[derive(Debug, Clone, Copy)]
pub struct PairedSeries<'a> {
    pub series: &'a Series,
    pub metric: &'a SeriesMetric,
}

#[derive(Debug, thiserror::Error)]
pub enum SeriesShapeError {
    #[error("malformed series payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{series} series but {metrics} metrics")]
    LengthMismatch { series: usize, metrics: usize },
}

impl UnifyQueryResponse {
    pub fn parse(data: &Value) -> Result<Self, SeriesShapeError> {
        Ok(Self::deserialize(data)?)
    }

    /// Zip series with their metrics, refusing to guess when lengths differ.
    pub fn paired(&self) -> Result<Vec<PairedSeries<'_>>, SeriesShapeError> {
        if self.series.len() != self.metrics.len() {
            return Err(SeriesShapeError::LengthMismatch {
                series: self.series.len(),
                metrics: self.metrics.len(),
            });
        }
        Ok(self
            .series
            .iter()
            .zip(&self.metrics)
            .map(|(series, metric)| PairedSeries { series, metric })
            .collect())
    }
}

// =============================================================================
// Facade
// =============================================================================

#[derive(Debug, Clone)]
pub struct Monitor {
    api: ApiGateway,
}

impl Monitor {
    pub fn new(api: ApiGateway) -> Self {
        Self { api }
    }

    pub async fn get_metric_list(&self, req: &MetricListRequest) -> Result<MetricList, ApiError> {
        let payload = serde_json::to_value(req).map_err(|e| ApiError::decode("get_metric_list", e))?;
        let data = self.api.invoke(Action::GetMetricList, payload).await?;
        serde_json::from_value(data).map_err(|e| ApiError::decode("get_metric_list", e))
    }

    /// Returns the raw `data` object (`{series, metrics}`); shape checks are
    /// left to the caller so they can be reported rather than raised.
    pub async fn time_series_unify_query(&self, req: &UnifyQueryRequest) -> Result<Value, ApiError> {
        let payload = serde_json::to_value(req)
            .map_err(|e| ApiError::decode("time_series_unify_query", e))?;
        self.api.invoke(Action::TimeSeriesUnifyQuery, payload).await
    }
}
