//! Metric catalog and time-series query tool.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::persist::{PersistError, Persister};
use super::{parse_args, Tool, ToolResult};
use crate::api::monitor::{
    Condition, MetricListRequest, QueryConfig, RawMetric, UnifyQueryRequest, UnifyQueryResponse,
};
use crate::api::{ApiError, MonitorService};

/// Infrastructure dimensions that carry no analytical signal.
pub const DIMENSION_DENYLIST: &[&str] = &[
    "bcs_cluster_id",
    "bk_endpoint_index",
    "bk_endpoint_url",
    "bk_instance",
    "bk_job",
    "bk_monitor_name",
    "bk_monitor_namespace",
    "bk_monitor_namespace/bk_monitor_name",
    "bk_agent_id",
    "devops_id",
];

pub fn keep_dimension(id: &str) -> bool {
    !DIMENSION_DENYLIST.contains(&id)
}

const DEFAULT_METHOD: &str = "AVG";
const DEFAULT_WINDOW_SECS: i64 = 3600;

const DESCRIPTION: &str = "Query monitoring metrics for a business. \
Use command `list` to discover available metrics (optionally filtered by `search`), \
then command `query` with a metric_field and result_table_id to fetch its time series. \
A successful query saves the data and returns a json_config_path for visualization.";

#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error("monitor config is not correct")]
    NotConfigured,
    #[error("unknown command `{0}`, expected one of: list, query")]
    UnknownCommand(String),
    #[error("`{0}` is required for query")]
    MissingArgument(&'static str),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("parse result error: {0}")]
    ParseResult(String),
    #[error("persist error: {0}")]
    Persist(PersistError),
}

impl GatherError {
    /// Short error code for logging; API failures keep the gateway's code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::UnknownCommand(_) => "unknown_command",
            Self::MissingArgument(_) => "missing_argument",
            Self::Api(e) => e.code(),
            Self::ParseResult(_) => "parse_result",
            Self::Persist(_) => "persist_error",
        }
    }
}

impl From<PersistError> for GatherError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Shape(e) => Self::ParseResult(e.to_string()),
            PersistError::NothingToPersist => {
                Self::ParseResult("no series with datapoints".to_string())
            }
            other => Self::Persist(other),
        }
    }
}

/// A catalog entry ready to be queried.
#[derive(Debug, Clone, Serialize)]
pub struct MetricDescriptor {
    pub id: i64,
    pub name: String,
    pub metric_field: String,
    pub result_table_id: String,
    /// Query template with empty time bounds.
    pub parameters: Value,
    pub dimensions: Vec<String>,
}

impl MetricDescriptor {
    pub fn from_raw(bk_biz_id: i64, raw: RawMetric) -> Self {
        let parameters = json!({
            "bk_biz_id": bk_biz_id,
            "name": raw.name,
            "start_time": "",
            "end_time": "",
            "query_configs": [
                QueryConfig::single(&raw.metric_field, DEFAULT_METHOD, &raw.result_table_id)
            ],
        });
        Self {
            id: raw.id,
            name: raw.name,
            metric_field: raw.metric_field,
            result_table_id: raw.result_table_id,
            parameters,
            dimensions: raw
                .dimensions
                .into_iter()
                .map(|d| d.id)
                .filter(|id| keep_dimension(id))
                .collect(),
        }
    }
}

impl fmt::Display for MetricDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- id: {}", self.id)?;
        writeln!(f, "  name: {}", self.name)?;
        writeln!(f, "  metric_field: {}", self.metric_field)?;
        writeln!(f, "  result_table_id: {}", self.result_table_id)?;
        write!(f, "  dimensions: [{}]", self.dimensions.join(", "))
    }
}

fn default_data_type_label() -> String {
    "time_series".to_string()
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    1000
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

#[derive(Debug, Deserialize)]
struct GatherArgs {
    command: String,
    bk_biz_id: i64,
    #[serde(default)]
    search: Option<String>,
    #[serde(default = "default_data_type_label")]
    data_type_label: String,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
    #[serde(default)]
    start_time: Option<i64>,
    #[serde(default)]
    end_time: Option<i64>,
    #[serde(default)]
    metric_field: Option<String>,
    #[serde(default)]
    result_table_id: Option<String>,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    group_by: Option<Vec<String>>,
}

pub struct GatherData {
    service: Option<MonitorService>,
    persister: Persister,
}

impl GatherData {
    /// `service` is `None` when the monitoring platform is not configured;
    /// every call then fails with a configuration error result.
    pub fn new(service: Option<MonitorService>, persister: Persister) -> Self {
        Self { service, persister }
    }

    fn service(&self) -> Result<&MonitorService, GatherError> {
        self.service.as_ref().ok_or(GatherError::NotConfigured)
    }

    pub async fn list(
        &self,
        bk_biz_id: i64,
        search: Option<&str>,
        data_type_label: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<MetricDescriptor>, GatherError> {
        let service = self.service()?;
        let conditions = match search.map(str::trim) {
            Some(s) if !s.is_empty() => vec![Condition::query(s)],
            _ => Vec::new(),
        };

        let req = MetricListRequest {
            conditions,
            data_type_label: data_type_label.to_string(),
            tag: String::new(),
            page,
            page_size,
            bk_biz_id,
        };
        let list = service.monitor.get_metric_list(&req).await?;
        debug!(count = list.metric_list.len(), total = list.count, "fetched metric list");

        Ok(list
            .metric_list
            .into_iter()
            .map(|raw| MetricDescriptor::from_raw(bk_biz_id, raw))
            .collect())
    }

    async fn query(&self, args: GatherArgs) -> Result<ToolResult, GatherError> {
        let service = self.service()?;
        let metric_field = args
            .metric_field
            .ok_or(GatherError::MissingArgument("metric_field"))?;
        let result_table_id = args
            .result_table_id
            .ok_or(GatherError::MissingArgument("result_table_id"))?;

        let (start_time, end_time) = match (args.start_time, args.end_time) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                let now = Utc::now().timestamp();
                (now - DEFAULT_WINDOW_SECS, now)
            }
        };

        let config = QueryConfig::single(&metric_field, &args.method, &result_table_id)
            .group_by(args.group_by.unwrap_or_default());
        let req = UnifyQueryRequest {
            bk_biz_id: args.bk_biz_id,
            query_configs: vec![config],
            expression: "a".to_string(),
            start_time,
            end_time,
        };

        info!(
            bk_biz_id = args.bk_biz_id,
            %metric_field,
            %result_table_id,
            start_time,
            end_time,
            "querying time series"
        );
        let data = service.monitor.time_series_unify_query(&req).await?;

        let response = UnifyQueryResponse::parse(&data)
            .map_err(|e| GatherError::ParseResult(e.to_string()))?;
        let first = response
            .series
            .first()
            .cloned()
            .ok_or_else(|| GatherError::ParseResult("no series returned".to_string()))?;

        let path = self.persister.persist(args.bk_biz_id, &response)?;
        let path = path.display().to_string();

        let output = format!(
            "Metric: \n - target: {}\n  json_config_path: \"{}\"",
            first.target, path
        );
        Ok(ToolResult::ok(output).with_data(json!({
            "data": data,
            "datapoints": first.datapoints,
            "target": first.target,
            "unit": first.unit,
            "json_config_path": path,
        })))
    }

    async fn run(&self, args: GatherArgs) -> Result<ToolResult, GatherError> {
        match args.command.as_str() {
            "list" => {
                let metrics = self
                    .list(
                        args.bk_biz_id,
                        args.search.as_deref(),
                        &args.data_type_label,
                        args.page,
                        args.page_size,
                    )
                    .await?;
                let mut output = String::from("Available metrics:");
                for m in &metrics {
                    output.push('\n');
                    output.push_str(&m.to_string());
                }
                let data = serde_json::to_value(&metrics).unwrap_or(Value::Null);
                Ok(ToolResult::ok(output).with_data(data))
            }
            "query" => self.query(args).await,
            other => Err(GatherError::UnknownCommand(other.to_string())),
        }
    }
}

#[async_trait]
impl Tool for GatherData {
    fn name(&self) -> &'static str {
        "gather_data"
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": ["list", "query"],
                    "description": "list: discover metrics; query: fetch one metric's time series"
                },
                "bk_biz_id": {"type": "integer", "description": "business id"},
                "search": {"type": "string", "description": "free-text filter for list"},
                "data_type_label": {"type": "string", "enum": ["time_series"], "default": "time_series"},
                "page": {"type": "integer", "default": 1},
                "page_size": {"type": "integer", "default": 1000},
                "start_time": {"type": "integer", "description": "unix seconds; defaults to one hour ago"},
                "end_time": {"type": "integer", "description": "unix seconds; defaults to now"},
                "metric_field": {"type": "string"},
                "result_table_id": {"type": "string"},
                "method": {
                    "type": "string",
                    "enum": ["SUM", "AVG", "MAX", "MIN", "COUNT"],
                    "default": "AVG"
                },
                "group_by": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["command", "bk_biz_id"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: GatherArgs = match parse_args(args) {
            Ok(a) => a,
            Err(result) => return result,
        };
        let command = args.command.clone();

        match self.run(args).await {
            Ok(result) => result,
            Err(err) => {
                warn!(%command, code = err.code(), "gather_data failed: {err}");
                ToolResult::fail(err.to_string())
            }
        }
    }
}
