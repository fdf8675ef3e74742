//! Command lines for the renderer and the encoder.

use std::path::{Path, PathBuf};
use std::process::Command;

use scenecast_common::error::Stage;
use serde::Serialize;

use crate::config::{Codec, RenderConfig};
use crate::layout::{ArtifactLayout, FIRST_FRAME};

/// Environment variables the scene script can read its parameters from.
pub const ENV_WIDTH: &str = "SCENECAST_WIDTH";
pub const ENV_HEIGHT: &str = "SCENECAST_HEIGHT";
pub const ENV_FPS: &str = "SCENECAST_FPS";
pub const ENV_DURATION: &str = "SCENECAST_DURATION";
pub const ENV_FRAME_END: &str = "SCENECAST_FRAME_END";

/// A single external-process call: program, arguments, extra environment,
/// and working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub stage: Stage,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub work_dir: PathBuf,
}

impl Invocation {
    /// Shell-quoted rendering of the command, for logs and dry runs.
    pub fn command_line(&self) -> String {
        let program = self.program.to_string_lossy();
        let words = std::iter::once(&*program).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| {
            std::iter::once(program.to_string())
                .chain(self.args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    /// Value following `flag` in the argument list, if any.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&self.work_dir);
        cmd
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn scene_expr(statement: impl AsRef<str>) -> String {
    format!("import bpy; bpy.context.scene.{}", statement.as_ref())
}

/// Build the Blender background render command.
///
/// Scene settings are applied before the scene script runs so the script
/// sees the final frame range while it keys its animation. Width, height,
/// fps and duration are also handed to the script after `--` and through
/// the environment.
pub fn render_invocation(config: &RenderConfig, layout: &ArtifactLayout, work_dir: &Path) -> Invocation {
    let frame_end = FIRST_FRAME + layout.total_frames.saturating_sub(1);

    let mut args = vec!["--background".to_string()];
    for statement in [
        format!("render.resolution_x = {}", config.width),
        format!("render.resolution_y = {}", config.height),
        "render.resolution_percentage = 100".to_string(),
        format!("render.fps = {}", config.fps),
        "render.fps_base = 1.0".to_string(),
        format!("frame_start = {FIRST_FRAME}"),
        format!("frame_end = {frame_end}"),
    ] {
        args.push("--python-expr".to_string());
        args.push(scene_expr(statement));
    }

    args.extend([
        "--python".to_string(),
        path_arg(&config.input_script),
        "--render-output".to_string(),
        path_arg(&layout.render_output_pattern()),
        "--render-format".to_string(),
        "PNG".to_string(),
        "--render-anim".to_string(),
        "--".to_string(),
        "--width".to_string(),
        config.width.to_string(),
        "--height".to_string(),
        config.height.to_string(),
        "--fps".to_string(),
        config.fps.to_string(),
        "--duration".to_string(),
        config.duration_secs.to_string(),
    ]);

    let env = vec![
        (ENV_WIDTH.to_string(), config.width.to_string()),
        (ENV_HEIGHT.to_string(), config.height.to_string()),
        (ENV_FPS.to_string(), config.fps.to_string()),
        (ENV_DURATION.to_string(), config.duration_secs.to_string()),
        (ENV_FRAME_END.to_string(), frame_end.to_string()),
    ];

    Invocation {
        stage: Stage::Render,
        program: config.renderer_path.clone(),
        args,
        env,
        work_dir: work_dir.to_path_buf(),
    }
}

/// Build the ffmpeg command assembling the rendered frames into the
/// configured container.
pub fn encode_invocation(config: &RenderConfig, layout: &ArtifactLayout, work_dir: &Path) -> Invocation {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-nostdin",
        "-y",
        "-framerate",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    args.push(config.fps.to_string());
    args.extend([
        "-start_number".to_string(),
        FIRST_FRAME.to_string(),
        "-i".to_string(),
        path_arg(&layout.encoder_input_pattern()),
        "-c:v".to_string(),
        config.codec.encoder_library().to_string(),
        "-crf".to_string(),
        config.crf.to_string(),
    ]);
    args.extend(codec_extra_args(config));
    args.extend([
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);
    if config.container.is_iso_bmff() {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    args.extend([
        "-f".to_string(),
        config.container.muxer().to_string(),
        path_arg(&layout.output_path),
    ]);

    Invocation {
        stage: Stage::Encode,
        program: config.encoder_path.clone(),
        args,
        env: Vec::new(),
        work_dir: work_dir.to_path_buf(),
    }
}

fn codec_extra_args(config: &RenderConfig) -> Vec<String> {
    match config.codec {
        // Constant-quality mode needs the bitrate cap disabled.
        Codec::Vp9 => vec!["-b:v".to_string(), "0".to_string()],
        // Apple players only accept hvc1-tagged HEVC.
        Codec::H265 if config.container.is_iso_bmff() => {
            vec!["-tag:v".to_string(), "hvc1".to_string()]
        }
        Codec::Av1 | Codec::H264 | Codec::H265 => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderOverrides;

    fn resolve(overrides: RenderOverrides) -> (RenderConfig, ArtifactLayout) {
        let config = RenderConfig::resolve([&overrides]).unwrap();
        let layout = ArtifactLayout::new(&config, Path::new("/work"));
        (config, layout)
    }

    fn hd_h264_overrides() -> RenderOverrides {
        RenderOverrides {
            width: Some(1920),
            height: Some(1080),
            fps: Some(30),
            duration: Some(30),
            codec: Some("H264".into()),
            output_path: Some("render/output.mp4".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_invocation_carries_numeric_settings() {
        let (config, layout) = resolve(hd_h264_overrides());
        let inv = render_invocation(&config, &layout, Path::new("/work"));

        let script_args = inv
            .args
            .iter()
            .skip_while(|a| *a != "--")
            .skip(1)
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(
            script_args,
            vec!["--width", "1920", "--height", "1080", "--fps", "30", "--duration", "30"]
        );
        assert!(inv
            .args
            .contains(&"import bpy; bpy.context.scene.render.resolution_x = 1920".to_string()));
        assert!(inv
            .args
            .contains(&"import bpy; bpy.context.scene.frame_end = 900".to_string()));
        assert_eq!(inv.arg_value("--python"), Some("scene.py"));
        assert_eq!(
            inv.arg_value("--render-output"),
            Some("/work/render/output_frames/frame_#####")
        );
        assert_eq!(inv.stage, Stage::Render);
    }

    #[test]
    fn test_render_settings_precede_script() {
        let (config, layout) = resolve(RenderOverrides::default());
        let inv = render_invocation(&config, &layout, Path::new("/work"));

        let last_expr = inv.args.iter().rposition(|a| a == "--python-expr").unwrap();
        let script = inv.args.iter().position(|a| a == "--python").unwrap();
        let anim = inv.args.iter().position(|a| a == "--render-anim").unwrap();
        assert_eq!(inv.args[0], "--background");
        assert!(last_expr < script);
        assert!(script < anim);
    }

    #[test]
    fn test_render_environment() {
        let (config, layout) = resolve(hd_h264_overrides());
        let inv = render_invocation(&config, &layout, Path::new("/work"));
        let env = |key: &str| {
            inv.env
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(env(ENV_WIDTH), Some("1920"));
        assert_eq!(env(ENV_HEIGHT), Some("1080"));
        assert_eq!(env(ENV_FPS), Some("30"));
        assert_eq!(env(ENV_DURATION), Some("30"));
        assert_eq!(env(ENV_FRAME_END), Some("900"));
    }

    #[test]
    fn test_encode_invocation_targets_configured_output() {
        let (config, layout) = resolve(hd_h264_overrides());
        let inv = encode_invocation(&config, &layout, Path::new("/work"));

        assert_eq!(inv.stage, Stage::Encode);
        assert_eq!(inv.program, PathBuf::from("ffmpeg"));
        assert_eq!(inv.args.last().map(String::as_str), Some("render/output.mp4"));
        assert_eq!(inv.arg_value("-c:v"), Some("libx264"));
        assert_eq!(inv.arg_value("-crf"), Some("20"));
        assert_eq!(inv.arg_value("-framerate"), Some("30"));
        assert_eq!(inv.arg_value("-start_number"), Some("1"));
        assert_eq!(
            inv.arg_value("-i"),
            Some("/work/render/output_frames/frame_%05d.png")
        );
        assert_eq!(inv.arg_value("-f"), Some("mp4"));
        assert_eq!(inv.arg_value("-movflags"), Some("+faststart"));
    }

    #[test]
    fn test_codec_specific_encoder_args() {
        let (config, layout) = resolve(RenderOverrides {
            codec: Some("VP9".into()),
            container: Some("WEBM".into()),
            crf: Some(31),
            ..Default::default()
        });
        let vp9 = encode_invocation(&config, &layout, Path::new("/work"));
        assert_eq!(vp9.arg_value("-c:v"), Some("libvpx-vp9"));
        assert_eq!(vp9.arg_value("-b:v"), Some("0"));
        assert_eq!(vp9.arg_value("-f"), Some("webm"));

        let (config, layout) = resolve(RenderOverrides {
            codec: Some("H265".into()),
            container: Some("MP4".into()),
            ..Default::default()
        });
        let hevc = encode_invocation(&config, &layout, Path::new("/work"));
        assert_eq!(hevc.arg_value("-tag:v"), Some("hvc1"));
        assert_eq!(hevc.arg_value("-movflags"), Some("+faststart"));
        assert_eq!(hevc.arg_value("-f"), Some("mp4"));

        let (config, layout) = resolve(RenderOverrides::default());
        let av1 = encode_invocation(&config, &layout, Path::new("/work"));
        assert_eq!(av1.arg_value("-c:v"), Some("libsvtav1"));
        assert_eq!(av1.arg_value("-tag:v"), None);
    }

    #[test]
    fn test_command_line_quotes_spaces() {
        let (config, layout) = resolve(RenderOverrides {
            renderer_path: Some("/opt/Blender App/blender".into()),
            ..Default::default()
        });
        let inv = render_invocation(&config, &layout, Path::new("/work"));
        let line = inv.command_line();

        let words = shlex::split(&line).unwrap();
        assert_eq!(words[0], "/opt/Blender App/blender");
        assert_eq!(&words[1..], inv.args.as_slice());
    }
}
