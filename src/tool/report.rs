//! Report synthesis: reassemble persisted series, ask the model for a
//! narrative, render it with summary statistics and business metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::drawer::{Visualizer, VISUALIZATION_TOOL_TYPE};
use super::render::{Chart, RenderError, ReportPage, ReportRenderer, Stat, DEFAULT_TEMPLATE};
use super::{parse_args, Tool, ToolResult};
use crate::api::{ApiError, BusinessRecord, Cmdb};
use crate::artifact::{ArtifactError, ConfigEntry, InsightFile, VisualizationConfig};
use crate::llm::{ChatGateway, ChatRequest, ProviderError};

const DESCRIPTION: &str = "You are a senior operations data analyst. \
Given monitoring metrics for a business, each with its raw datapoints, a chart and a short \
statistical summary, write a clear data analysis report in markdown: an overview, \
one section per metric describing trends, peaks and anomalies, and closing recommendations. \
Takes the json_config_path produced by gather_data after the drawer has run.";

const PROMPT_HEADER: &str =
    "Please produce a data analysis report covering the following metrics:";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("{0} config is not correct")]
    NotConfigured(&'static str),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("Report error: can not find data file {path}")]
    MissingData {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("language model error: {0}")]
    Llm(#[from] ProviderError),
    #[error("business lookup failed: {0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ReportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::Artifact(_) => "artifact_error",
            Self::MissingData { .. } => "missing_data",
            Self::Llm(_) => "llm_error",
            Self::Api(_) => "api_error",
            Self::Render(_) => "render_error",
        }
    }
}

/// Strip markdown fence markers the model tends to wrap its answer in.
///
/// Only literal triple backticks are removed; inline code and leading
/// whitespace are untouched.
pub fn trim_fences(text: &str) -> String {
    let text = ["```markdown", "```md", "markdown```"]
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
        .unwrap_or(text);
    text.replace("```", "")
}

/// Per-metric bundle sent to the model.
#[derive(Debug, Clone)]
struct MetricContext {
    name: String,
    datapoints: String,
    chart_path: String,
    insight: String,
}

fn build_prompt(contexts: &[MetricContext], language: &str) -> String {
    let mut prompt = String::from(PROMPT_HEADER);
    for c in contexts {
        prompt.push_str(&format!(
            "\n{} - raw data: {} - chart: {} - summary: {}",
            c.name, c.datapoints, c.chart_path, c.insight
        ));
    }
    if language == "zh" {
        prompt.push_str("\nWrite the report in Chinese.");
    }
    prompt
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize)]
struct ReportArgs {
    json_config_path: String,
    #[serde(default = "default_language")]
    language: String,
}

pub struct ReportTool {
    workspace: PathBuf,
    chat: Option<Arc<dyn ChatGateway>>,
    model: String,
    cmdb: Option<Cmdb>,
    visualizer: Arc<dyn Visualizer>,
    renderer: ReportRenderer,
    template: String,
}

impl ReportTool {
    pub fn new(
        workspace: impl Into<PathBuf>,
        chat: Option<Arc<dyn ChatGateway>>,
        model: impl Into<String>,
        cmdb: Option<Cmdb>,
        visualizer: Arc<dyn Visualizer>,
        renderer: ReportRenderer,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            chat,
            model: model.into(),
            cmdb,
            visualizer,
            renderer,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.template = name.into();
        self
    }

    /// `<workspace>/<artifact stem>.html`, wherever the artifact itself lives.
    pub fn report_path(&self, config_path: &Path) -> PathBuf {
        let stem = config_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        self.workspace.join(format!("{stem}.html"))
    }

    async fn collect_contexts(
        &self,
        config_path: &str,
        entries: &[ConfigEntry],
        language: &str,
    ) -> Result<Vec<MetricContext>, ReportError> {
        let mut contexts = Vec::with_capacity(entries.len());

        for entry in entries {
            let datapoints = std::fs::read_to_string(&entry.csv_file_path).map_err(|source| {
                ReportError::MissingData {
                    path: entry.csv_file_path.clone(),
                    source,
                }
            })?;

            let insight = match std::fs::read_to_string(&entry.insights_file_path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %entry.insights_file_path, "insight file unavailable: {e}");
                    let outcome = self
                        .visualizer
                        .visualize(config_path, "png", VISUALIZATION_TOOL_TYPE, language)
                        .await;
                    debug!(success = outcome.success, "visualization retry finished");
                    String::new()
                }
            };

            contexts.push(MetricContext {
                name: entry.name.clone(),
                datapoints,
                chart_path: entry.chart_file_path.clone(),
                insight,
            });
        }
        Ok(contexts)
    }

    fn collect_stats(entries: &[ConfigEntry]) -> Vec<Stat> {
        let mut stats = Vec::new();
        for entry in entries {
            match InsightFile::load(Path::new(&entry.insights)) {
                Ok(file) => stats.extend(file.insights.into_iter().map(|i| Stat {
                    name: format!("{} {}", entry.name, i.kind),
                    value: i.value,
                })),
                Err(e) => warn!(series = %entry.name, "skipping insights: {e}"),
            }
        }
        stats
    }

    fn collect_charts(entries: &[ConfigEntry]) -> Vec<Chart> {
        entries
            .iter()
            .map(|entry| Chart {
                title: entry.chart_title.clone(),
                path: entry.chart_file_path.clone(),
            })
            .collect()
    }

    async fn business(&self, bk_biz_id: i64) -> Result<BusinessRecord, ReportError> {
        let cmdb = self.cmdb.as_ref().ok_or(ReportError::NotConfigured("monitor"))?;
        let found = cmdb.business_by_id(bk_biz_id).await?;
        match found.first() {
            Some(record) => Ok(record.clone()),
            None => {
                warn!(bk_biz_id, "business not found, rendering with placeholders");
                let placeholder = json!({
                    "bk_biz_id": bk_biz_id,
                    "bk_biz_name": "unknown",
                    "bk_app_abbr": "",
                });
                Ok(match placeholder {
                    Value::Object(map) => map,
                    _ => BusinessRecord::new(),
                })
            }
        }
    }

    pub async fn generate(
        &self,
        config_path: &str,
        language: &str,
    ) -> Result<(String, PathBuf), ReportError> {
        let chat = self.chat.as_ref().ok_or(ReportError::NotConfigured("llm"))?;
        let path = Path::new(config_path);
        let config = VisualizationConfig::load(path)?;

        let contexts = self
            .collect_contexts(config_path, &config.config, language)
            .await?;
        info!(metrics = contexts.len(), "requesting report narrative");

        let req = ChatRequest::new(
            self.model.clone(),
            DESCRIPTION,
            build_prompt(&contexts, language),
            "report",
        );
        let raw = chat.chat(req).await?.content;
        let narrative = trim_fences(&raw);

        let stats = Self::collect_stats(&config.config);
        let charts = Self::collect_charts(&config.config);
        let business = self.business(config.bk_biz_id).await?;

        let report_path = self.report_path(path);
        let page = ReportPage {
            report: &narrative,
            stats: &stats,
            charts: &charts,
            business: &business,
        };
        self.renderer.render_to(&report_path, &self.template, page)?;
        info!(
            path = %report_path.display(),
            stats = stats.len(),
            charts = charts.len(),
            "report rendered"
        );

        Ok((raw, report_path))
    }
}

#[async_trait]
impl Tool for ReportTool {
    fn name(&self) -> &'static str {
        "report"
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "json_config_path": {"type": "string", "description": "visualization config path"},
                "language": {"type": "string", "enum": ["zh", "en"], "default": "en"}
            },
            "required": ["json_config_path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: ReportArgs = match parse_args(args) {
            Ok(a) => a,
            Err(result) => return result,
        };

        match self.generate(&args.json_config_path, &args.language).await {
            Ok((raw, report_path)) => ToolResult::ok(raw).with_data(json!({
                "report_path": report_path.display().to_string(),
            })),
            Err(err) => {
                warn!(code = err.code(), "report failed: {err}");
                ToolResult::fail(err.to_string())
            }
        }
    }
}
