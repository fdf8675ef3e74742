//! JSON summary of a run, written on request for CI systems.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scenecast_common::error::{ScenecastError, ScenecastResult};
use serde::Serialize;

use crate::config::RenderConfig;
use crate::pipeline::{RenderPipeline, StageRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub exit_code: u8,
    pub artifact: Option<PathBuf>,
    pub error: Option<String>,
    pub config: RenderConfig,
    pub frames_dir: PathBuf,
    pub stages: Vec<StageRecord>,
}

impl RunReport {
    /// Summarize a finished run.
    pub fn from_run(
        pipeline: &RenderPipeline,
        started_at: DateTime<Utc>,
        result: &ScenecastResult<PathBuf>,
    ) -> Self {
        let (status, exit_code, artifact, error) = match result {
            Ok(path) => (RunStatus::Success, 0, Some(path.clone()), None),
            Err(err) => (RunStatus::Failed, err.exit_code(), None, Some(err.to_string())),
        };

        Self {
            started_at,
            finished_at: Utc::now(),
            status,
            exit_code,
            artifact,
            error,
            config: pipeline.config().clone(),
            frames_dir: pipeline.plan().layout.frames_dir.clone(),
            stages: pipeline.stages().to_vec(),
        }
    }

    pub fn write(&self, path: &Path) -> ScenecastResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        parent
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(path, json))
            .map_err(|e| {
                ScenecastError::Other(anyhow::anyhow!(
                    "failed to write run report to '{}': {e}",
                    path.display()
                ))
            })?;
        tracing::info!(report = %path.display(), "Wrote run report");
        Ok(())
    }
}
