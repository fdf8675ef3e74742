//! SceneCast CLI — render a procedural Blender scene and encode it to video.
//!
//! Usage:
//!   scenecast [OPTIONS]
//!
//! Every render option falls back to the settings file
//! (`--config`, or `$XDG_CONFIG_HOME/scenecast/config.json`) and then to
//! the documented default.
//!
//! Exit codes: 0 success, 1 internal error, 2 configuration error,
//! 3 renderer failure, 4 missing rendered frames, 5 encoder failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser};
use scenecast_common::config::LoggingConfig;
use scenecast_common::error::EXIT_INTERNAL;
use scenecast_render_pipeline::config::RenderOverrides;

mod commands;

#[derive(Parser)]
#[command(
    name = "scenecast",
    about = "Render a procedural Blender scene headlessly and encode it to video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Settings file with default render options (JSON)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the resolved configuration and commands without running them
    #[arg(long)]
    dry_run: bool,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args)]
struct RenderArgs {
    /// Path to the renderer executable [default: platform Blender location]
    #[arg(long, visible_alias = "blender-path", value_name = "PATH")]
    renderer_path: Option<PathBuf>,

    /// Path to the encoder executable [default: ffmpeg]
    #[arg(long, value_name = "PATH")]
    encoder_path: Option<PathBuf>,

    /// Scene-generation script run inside the renderer [default: scene.py]
    #[arg(long, value_name = "PATH")]
    input_script: Option<PathBuf>,

    /// Final video file [default: render/movie.mkv]
    #[arg(long, value_name = "PATH")]
    output_path: Option<PathBuf>,

    /// Render width in pixels [default: 3840]
    #[arg(long, allow_negative_numbers = true)]
    width: Option<i64>,

    /// Render height in pixels [default: 2160]
    #[arg(long, allow_negative_numbers = true)]
    height: Option<i64>,

    /// Frames per second [default: 60]
    #[arg(long, allow_negative_numbers = true)]
    fps: Option<i64>,

    /// Animation duration in seconds [default: 60]
    #[arg(long, allow_negative_numbers = true)]
    duration: Option<i64>,

    /// Container format: MKV, MP4, WEBM, MOV [default: from the output extension, else MKV]
    #[arg(long)]
    container: Option<String>,

    /// Video codec: AV1, H264, H265, VP9 [default: AV1]
    #[arg(long)]
    codec: Option<String>,

    /// Constant rate factor, lower is better quality [default: 20]
    #[arg(long, allow_negative_numbers = true)]
    crf: Option<i64>,

    /// Render frames only and skip encoding; `--frames-only=false` undoes
    /// a settings file that turns it on
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    frames_only: Option<bool>,
}

impl RenderArgs {
    fn into_overrides(self) -> RenderOverrides {
        RenderOverrides {
            renderer_path: self.renderer_path,
            encoder_path: self.encoder_path,
            input_script: self.input_script,
            output_path: self.output_path,
            width: self.width,
            height: self.height,
            fps: self.fps,
            duration: self.duration,
            container: self.container,
            codec: self.codec,
            crf: self.crf,
            frames_only: self.frames_only,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let logging = LoggingConfig {
        level: log_level.to_string(),
        json: cli.log_json,
        file: cli.log_file.clone(),
    };
    if let Err(e) = scenecast_common::logging::init_logging(&logging) {
        eprintln!("Error: failed to initialize logging: {e}");
        return ExitCode::from(EXIT_INTERNAL);
    }

    let options = commands::render::RenderOptions {
        settings: cli.config,
        dry_run: cli.dry_run,
        report: cli.report,
        overrides: cli.render.into_overrides(),
    };

    match commands::render::run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
