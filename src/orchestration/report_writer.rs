//! Persists one JSON artifact per run, named by the run's start time.

use crate::config::ReportConfig;
use crate::error::PipelineResult;
use crate::models::RunReport;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ReportWriter {
    directory: PathBuf,
}

impl ReportWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// `None` when report persistence is disabled
    pub fn from_config(config: &ReportConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config.directory.clone()))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// `run-report-<start time>-<run id prefix>.json`, sortable by start time
    pub fn file_name_for(report: &RunReport) -> String {
        let run_id = report.run_id().simple().to_string();
        format!(
            "run-report-{}-{}.json",
            report.started_at().format("%Y%m%dT%H%M%S%.3fZ"),
            &run_id[..8]
        )
    }

    pub async fn write(&self, report: &RunReport) -> PipelineResult<PathBuf> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(Self::file_name_for(report));
        let body = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&path, body).await?;
        debug!(run_id = %report.run_id(), path = %path.display(), "Run report written");
        Ok(path)
    }
}
