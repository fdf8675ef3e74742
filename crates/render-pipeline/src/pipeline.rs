//! The render-then-encode run.
//!
//! Steps run strictly in sequence and the first failure ends the run:
//!
//! 1. check the scene script exists and prepare the frames directory
//! 2. run the renderer; a nonzero exit is fatal
//! 3. check the expected frames exist; absence is a missing-artifact error
//! 4. run the encoder (unless frames only); a nonzero exit is fatal

use std::path::{Path, PathBuf};
use std::time::Instant;

use scenecast_common::error::{ScenecastError, ScenecastResult};
use serde::Serialize;

use crate::config::RenderConfig;
use crate::invocation::{encode_invocation, render_invocation, Invocation};
use crate::layout::ArtifactLayout;
use crate::process::{CommandRunner, ProcessOutcome};

/// Everything a run will do, computed up front without side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelinePlan {
    pub layout: ArtifactLayout,
    pub render: Invocation,
    /// `None` when only frames were requested.
    pub encode: Option<Invocation>,
}

impl PipelinePlan {
    pub fn new(config: &RenderConfig, work_dir: &Path) -> Self {
        let layout = ArtifactLayout::new(config, work_dir);
        let render = render_invocation(config, &layout, work_dir);
        let encode = (!config.frames_only).then(|| encode_invocation(config, &layout, work_dir));
        Self {
            layout,
            render,
            encode,
        }
    }

    pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        std::iter::once(&self.render).chain(self.encode.as_ref())
    }
}

/// A finished external-process step.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub invocation: Invocation,
    pub outcome: ProcessOutcome,
    pub elapsed_secs: f64,
}

/// A single render-and-encode run over a resolved configuration.
#[derive(Debug)]
pub struct RenderPipeline {
    config: RenderConfig,
    work_dir: PathBuf,
    plan: PipelinePlan,
    stages: Vec<StageRecord>,
}

impl RenderPipeline {
    /// Plan a run; relative paths are resolved against `work_dir`, which is
    /// also the working directory of both external processes.
    pub fn new(config: RenderConfig, work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let plan = PipelinePlan::new(&config, &work_dir);
        Self {
            config,
            work_dir,
            plan,
            stages: Vec::new(),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    /// Steps that ran to completion, in order, including a failed last one.
    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    /// Execute the run, returning the path of the final artifact: the video
    /// file, or the frames directory when only frames were requested.
    pub fn run<R: CommandRunner>(&mut self, mut runner: R) -> ScenecastResult<PathBuf> {
        let started = Instant::now();
        tracing::info!(
            output = %self.config.output_path.display(),
            resolution = %format!("{}x{}", self.config.width, self.config.height),
            fps = self.config.fps,
            duration_secs = self.config.duration_secs,
            codec = %self.config.codec,
            container = %self.config.container,
            "Starting render pipeline"
        );

        self.preflight()?;

        let render = self.plan.render.clone();
        self.run_stage(&mut runner, &render)?;

        if let Some(path) = self.plan.layout.first_missing_frame() {
            tracing::error!(
                path = %path.display(),
                "Renderer exited successfully but did not produce the expected frames"
            );
            return Err(ScenecastError::MissingArtifact { path });
        }

        let artifact = match self.plan.encode.clone() {
            Some(encode) => {
                self.run_stage(&mut runner, &encode)?;
                self.config.output_path.clone()
            }
            None => {
                tracing::info!("Frames only requested, skipping encode");
                self.plan.layout.frames_dir.clone()
            }
        };

        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            artifact = %artifact.display(),
            "Render pipeline finished"
        );
        Ok(artifact)
    }

    fn preflight(&self) -> ScenecastResult<()> {
        let script = self.work_dir.join(&self.config.input_script);
        if !script.is_file() {
            return Err(ScenecastError::ScriptNotFound {
                path: self.config.input_script.clone(),
            });
        }

        let extension = self
            .config
            .output_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !extension.eq_ignore_ascii_case(self.config.container.extension()) {
            tracing::warn!(
                output = %self.config.output_path.display(),
                container = %self.config.container,
                "Output extension does not match the container; writing {} anyway",
                self.config.container
            );
        }

        self.plan.layout.prepare(&self.work_dir)?;
        Ok(())
    }

    fn run_stage<R: CommandRunner>(
        &mut self,
        runner: &mut R,
        invocation: &Invocation,
    ) -> ScenecastResult<()> {
        tracing::info!(
            stage = %invocation.stage,
            command = %invocation.command_line(),
            "Launching {}",
            invocation.stage.tool()
        );

        let started = Instant::now();
        let outcome = runner.run(invocation)?;
        let elapsed_secs = started.elapsed().as_secs_f64();

        self.stages.push(StageRecord {
            invocation: invocation.clone(),
            outcome: outcome.clone(),
            elapsed_secs,
        });

        if !outcome.success() {
            tracing::error!(
                stage = %invocation.stage,
                exit_code = ?outcome.exit_code,
                elapsed_secs,
                "{} failed",
                invocation.stage.tool()
            );
            return Err(ScenecastError::process_failed(
                invocation.stage,
                outcome.exit_code,
                outcome.stderr,
            ));
        }

        tracing::info!(stage = %invocation.stage, elapsed_secs, "Stage complete");
        Ok(())
    }
}
