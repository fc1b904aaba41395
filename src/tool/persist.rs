//! Writes query results to the workspace: one CSV per non-empty series and
//! a visualization config describing them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, Utc};
use tracing::{debug, info};

use super::gather::keep_dimension;
use crate::api::monitor::{PairedSeries, SeriesShapeError, UnifyQueryResponse};
use crate::artifact::{ArtifactError, ConfigEntry, DatapointRecord, VisualizationConfig};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error(transparent)]
    Shape(#[from] SeriesShapeError),
    #[error("no series with datapoints")]
    NothingToPersist,
    #[error("csv error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Clone)]
pub struct Persister {
    workspace: PathBuf,
    /// `None` renders timestamps in the local zone.
    offset: Option<FixedOffset>,
}

impl Persister {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            offset: None,
        }
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// `YYYY-MM-DD HH:MM:SS` wall-clock time for an epoch in milliseconds.
    pub fn format_timestamp(&self, epoch_ms: i64) -> String {
        let Some(utc) = DateTime::<Utc>::from_timestamp_millis(epoch_ms) else {
            return epoch_ms.to_string();
        };
        match self.offset {
            Some(offset) => utc.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string(),
            None => utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn persist(
        &self,
        bk_biz_id: i64,
        response: &UnifyQueryResponse,
    ) -> Result<PathBuf, PersistError> {
        self.persist_at(bk_biz_id, response, Utc::now().timestamp())
    }

    /// Persist with an explicit artifact timestamp (unix seconds).
    ///
    /// Series are paired with their metrics before anything is written, so a
    /// shape error leaves the workspace untouched.
    pub fn persist_at(
        &self,
        bk_biz_id: i64,
        response: &UnifyQueryResponse,
        unix_seconds: i64,
    ) -> Result<PathBuf, PersistError> {
        let paired: Vec<PairedSeries<'_>> = response
            .paired()?
            .into_iter()
            .filter(|p| {
                let keep = !p.series.datapoints.is_empty();
                if !keep {
                    debug!(target_name = %p.series.target, "skipping empty series");
                }
                keep
            })
            .collect();

        if paired.is_empty() {
            return Err(PersistError::NothingToPersist);
        }

        let visualization_dir = self.workspace.join("visualization");
        std::fs::create_dir_all(&visualization_dir)
            .map_err(|e| ArtifactError::Io {
                path: visualization_dir.clone(),
                source: e,
            })?;

        let mut config = Vec::with_capacity(paired.len());
        for p in &paired {
            let stem = path_safe(&p.series.target);
            let csv_path = self.workspace.join(format!("{stem}.csv"));
            self.write_csv(&csv_path, p)?;

            config.push(ConfigEntry {
                csv_file_path: csv_path.display().to_string(),
                chart_title: format!(
                    "{} {}'s {}",
                    p.metric.result_table_id,
                    p.series.target,
                    title_case(&p.series.chart_type)
                ),
                chart_type: p.series.chart_type.clone(),
                dimensions: p
                    .metric
                    .dimensions
                    .iter()
                    .map(|d| d.id.clone())
                    .filter(|id| keep_dimension(id))
                    .collect(),
                insights_file_path: visualization_dir.join(format!("{stem}.md")).display().to_string(),
                chart_file_path: visualization_dir.join(format!("{stem}.png")).display().to_string(),
                insights: visualization_dir.join(format!("{stem}.json")).display().to_string(),
                name: p.metric.metric_field_name.clone(),
            });
        }

        let artifact = VisualizationConfig { bk_biz_id, config };
        let artifact_path = self.workspace.join(format!("{unix_seconds}.json"));
        artifact.save(&artifact_path)?;

        info!(
            series = artifact.config.len(),
            path = %artifact_path.display(),
            "persisted visualization config"
        );
        Ok(artifact_path)
    }

    fn write_csv(&self, path: &Path, paired: &PairedSeries<'_>) -> Result<(), PersistError> {
        let csv_err = |source| PersistError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::NonNumeric)
            .from_path(path)
            .map_err(csv_err)?;

        for point in &paired.series.datapoints {
            writer
                .serialize(DatapointRecord {
                    value: point.value().clone(),
                    timestamp: self.format_timestamp(point.epoch_ms()),
                })
                .map_err(csv_err)?;
        }
        writer.flush().map_err(|e| csv_err(e.into()))?;

        debug!(rows = paired.series.datapoints.len(), path = %path.display(), "wrote series csv");
        Ok(())
    }
}

fn path_safe(target: &str) -> String {
    target.replace(['/', '\\'], "_")
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
