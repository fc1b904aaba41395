//! Files shared between the query, visualization and report steps.
//!
//! The visualization config is the hand-off point: the query step writes it
//! together with one CSV per series, the chart step fills in the insight and
//! chart paths it declares, and the report step reads everything back.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// One queried series. Field order is the on-disk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub csv_file_path: String,
    pub chart_title: String,
    pub chart_type: String,
    pub dimensions: Vec<String>,
    pub insights_file_path: String,
    pub chart_file_path: String,
    pub insights: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    pub bk_biz_id: i64,
    pub config: Vec<ConfigEntry>,
}

impl VisualizationConfig {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| ArtifactError::json(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ArtifactError::io(parent, e))?;
        }
        let raw = serde_json::to_string_pretty(self).map_err(|e| ArtifactError::json(path, e))?;
        std::fs::write(path, raw).map_err(|e| ArtifactError::io(path, e))
    }
}

/// One CSV row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatapointRecord {
    pub value: Value,
    pub timestamp: String,
}

/// A single observation produced by the chart step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

/// Per-series `{insights: [{type, value}, ...]}` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightFile {
    #[serde(default)]
    pub insights: Vec<Insight>,
}

impl InsightFile {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| ArtifactError::json(path, e))
    }
}
