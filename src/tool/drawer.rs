//! Visualization step: hands a config artifact to the chart renderer.
//!
//! Rendering itself happens out of process. The renderer receives the
//! artifact path, output type and language as arguments, writes the insight
//! and chart files the artifact declares, and prints its result to stdout.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{info, warn};

use super::{parse_args, Tool, ToolResult};
use crate::artifact::VisualizationConfig;

pub const VISUALIZATION_TOOL_TYPE: &str = "visualization";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub success: bool,
}

impl VisualizationOutcome {
    pub fn ok(output: Value) -> Self {
        Self {
            output: Some(output),
            observation: None,
            success: true,
        }
    }

    pub fn error(detail: impl std::fmt::Display) -> Self {
        Self {
            output: None,
            observation: Some(format!("Error: {detail}")),
            success: false,
        }
    }
}

#[async_trait]
pub trait Visualizer: Send + Sync {
    async fn visualize(
        &self,
        config_path: &str,
        output_type: &str,
        tool_type: &str,
        language: &str,
    ) -> VisualizationOutcome;
}

/// Runs the chart renderer as a child process.
#[derive(Debug, Clone)]
pub struct SubprocessVisualizer {
    /// Program first, then fixed leading arguments.
    command: Vec<String>,
}

impl SubprocessVisualizer {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Visualizer for SubprocessVisualizer {
    async fn visualize(
        &self,
        config_path: &str,
        output_type: &str,
        tool_type: &str,
        language: &str,
    ) -> VisualizationOutcome {
        if tool_type != VISUALIZATION_TOOL_TYPE {
            return VisualizationOutcome {
                output: None,
                observation: Some("Only support 'visualization' tool_type now".to_string()),
                success: false,
            };
        }

        if let Err(e) = VisualizationConfig::load(Path::new(config_path)) {
            return VisualizationOutcome::error(e);
        }

        let Some((program, leading)) = self.command.split_first() else {
            return VisualizationOutcome::error("visualizer command not configured");
        };

        info!(%config_path, %output_type, %language, "running chart renderer");
        let output = match Command::new(program)
            .args(leading)
            .args([config_path, output_type, language])
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) => return VisualizationOutcome::error(format!("failed to start {program}: {e}")),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = %output.status, "chart renderer failed");
            return if stderr.is_empty() {
                VisualizationOutcome::error(output.status)
            } else {
                VisualizationOutcome::error(stderr)
            };
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let value = serde_json::from_str(&stdout).unwrap_or(Value::String(stdout));
        VisualizationOutcome::ok(value)
    }
}

fn default_output_type() -> String {
    "png".to_string()
}

fn default_tool_type() -> String {
    VISUALIZATION_TOOL_TYPE.to_string()
}

fn default_language() -> String {
    "zh".to_string()
}

#[derive(Debug, Deserialize)]
struct DrawerArgs {
    json_path: String,
    #[serde(default = "default_output_type")]
    output_type: String,
    #[serde(default = "default_tool_type")]
    tool_type: String,
    #[serde(default = "default_language")]
    language: String,
}

pub struct Drawer {
    visualizer: Arc<dyn Visualizer>,
}

impl Drawer {
    pub fn new(visualizer: Arc<dyn Visualizer>) -> Self {
        Self { visualizer }
    }
}

#[async_trait]
impl Tool for Drawer {
    fn name(&self) -> &'static str {
        "drawer"
    }

    fn description(&self) -> &'static str {
        "Render charts and per-series insights for a json_config_path produced by gather_data."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "json_path": {"type": "string", "description": "visualization config path"},
                "output_type": {"type": "string", "default": "png"},
                "tool_type": {"type": "string", "enum": ["visualization"], "default": "visualization"},
                "language": {"type": "string", "enum": ["zh", "en"], "default": "zh"}
            },
            "required": ["json_path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: DrawerArgs = match parse_args(args) {
            Ok(a) => a,
            Err(result) => return result,
        };

        let outcome = self
            .visualizer
            .visualize(&args.json_path, &args.output_type, &args.tool_type, &args.language)
            .await;

        if !outcome.success {
            return ToolResult::fail(outcome.observation.unwrap_or_default());
        }

        let output = match &outcome.output {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let mut result = ToolResult::ok(output);
        result.data = outcome.output;
        result
    }
}
