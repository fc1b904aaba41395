//! Agent-facing tools.
//!
//! Each tool declares a JSON-Schema-shaped parameter object and never fails
//! out of `execute`: errors come back as a labeled [`ToolResult`] the caller
//! can read and act on.

pub mod drawer;
pub mod gather;
pub mod persist;
pub mod render;
pub mod report;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use drawer::{Drawer, SubprocessVisualizer, VisualizationOutcome, Visualizer};
pub use gather::GatherData;
pub use persist::Persister;
pub use render::ReportRenderer;
pub use report::ReportTool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Also used verbatim as a system prompt where a tool talks to a model.
    fn description(&self) -> &'static str;

    fn parameters(&self) -> Value;

    async fn execute(&self, args: Value) -> ToolResult;
}

/// Decode tool arguments, turning a shape error into a failed result.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolResult> {
    serde_json::from_value(args).map_err(|e| ToolResult::fail(format!("invalid arguments: {e}")))
}
