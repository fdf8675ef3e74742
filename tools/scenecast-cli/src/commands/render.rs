//! Resolve the configuration, then render and encode.

use std::path::PathBuf;

use chrono::Utc;
use scenecast_common::error::ScenecastResult;
use scenecast_render_pipeline::config::{RenderConfig, RenderOverrides};
use scenecast_render_pipeline::{RenderPipeline, RunReport, SystemRunner};

pub struct RenderOptions {
    /// Explicit settings file.
    pub settings: Option<PathBuf>,
    pub dry_run: bool,
    pub report: Option<PathBuf>,
    /// Command-line overrides.
    pub overrides: RenderOverrides,
}

pub fn run(options: RenderOptions) -> ScenecastResult<()> {
    let settings: RenderOverrides =
        scenecast_common::config::load_settings(options.settings.as_deref())?;
    let config = RenderConfig::resolve([&settings, &options.overrides])?;
    let work_dir = std::env::current_dir()?;

    tracing::debug!(config = ?config, "Resolved configuration");

    println!("Rendering scene: {}", config.input_script.display());
    println!("  Output: {}", config.output_path.display());
    println!(
        "  Resolution: {}x{} @ {} fps, {}s ({} frames)",
        config.width,
        config.height,
        config.fps,
        config.duration_secs,
        config.total_frames()
    );
    if config.frames_only {
        println!("  Encode: skipped (frames only)");
    } else {
        println!(
            "  Encode: {} in {} (crf {})",
            config.codec, config.container, config.crf
        );
    }

    let mut pipeline = RenderPipeline::new(config, work_dir);

    if options.dry_run {
        println!();
        println!("Configuration:");
        println!("{}", serde_json::to_string_pretty(pipeline.config())?);
        println!();
        println!("Frames directory: {}", pipeline.plan().layout.frames_dir.display());
        for invocation in pipeline.plan().invocations() {
            println!();
            println!("{} command:", invocation.stage);
            println!("  {}", invocation.command_line());
        }
        return Ok(());
    }

    let started_at = Utc::now();
    let result = pipeline.run(SystemRunner);

    // A report that cannot be written must not mask a failed run's error.
    if let Some(path) = &options.report {
        let written = RunReport::from_run(&pipeline, started_at, &result).write(path);
        match (&result, written) {
            (_, Ok(())) => {}
            (Ok(_), Err(e)) => return Err(e),
            (Err(_), Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write run report");
            }
        }
    }

    let artifact = result?;
    println!();
    if pipeline.config().frames_only {
        println!("Render complete. Frames saved to: {}", artifact.display());
    } else {
        println!("Render complete. Video saved to: {}", artifact.display());
    }
    Ok(())
}
