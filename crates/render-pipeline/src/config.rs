//! Render configuration: defaults, layered overrides, and validation.
//!
//! A [`RenderConfig`] is resolved once per run from the documented
//! defaults, then each [`RenderOverrides`] layer in order (settings file,
//! then command line). The resolved record is immutable afterwards.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use scenecast_common::error::{ScenecastError, ScenecastResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INPUT_SCRIPT: &str = "scene.py";
pub const DEFAULT_OUTPUT_PATH: &str = "render/movie.mkv";
pub const DEFAULT_ENCODER_PATH: &str = "ffmpeg";
pub const DEFAULT_WIDTH: u32 = 3840;
pub const DEFAULT_HEIGHT: u32 = 2160;
pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_DURATION_SECS: u32 = 60;
pub const DEFAULT_CRF: u32 = 20;

/// Platform-dependent location of the Blender executable.
pub fn default_renderer_path() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/Applications/Blender.app/Contents/MacOS/Blender")
    } else if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\Blender Foundation\Blender\blender.exe")
    } else {
        PathBuf::from("blender")
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Container {
    Mkv,
    Mp4,
    Webm,
    Mov,
}

impl Container {
    pub const ALL: [Container; 4] = [
        Container::Mkv,
        Container::Mp4,
        Container::Webm,
        Container::Mov,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Container::Mkv => "MKV",
            Container::Mp4 => "MP4",
            Container::Webm => "WEBM",
            Container::Mov => "MOV",
        }
    }

    /// ffmpeg muxer name passed to `-f`.
    pub fn muxer(self) -> &'static str {
        match self {
            Container::Mkv => "matroska",
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
            Container::Mov => "mov",
        }
    }

    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mkv => "mkv",
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
            Container::Mov => "mov",
        }
    }

    /// Whether the container can carry a stream of this codec.
    pub fn supports(self, codec: Codec) -> bool {
        match self {
            Container::Mkv | Container::Mp4 => true,
            Container::Webm => matches!(codec, Codec::Av1 | Codec::Vp9),
            Container::Mov => !matches!(codec, Codec::Vp9),
        }
    }

    /// Container conventionally written to files with this extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        Container::ALL
            .into_iter()
            .find(|c| c.extension().eq_ignore_ascii_case(extension))
    }

    /// MP4-family containers want the index at the front for streaming.
    pub fn is_iso_bmff(self) -> bool {
        matches!(self, Container::Mp4 | Container::Mov)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Container {
    type Err = ScenecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Container::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ScenecastError::config(format!(
                    "unknown container '{s}'. Use one of: {}",
                    join_names(Container::ALL.iter().map(|c| c.as_str()))
                ))
            })
    }
}

/// Video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Codec {
    Av1,
    H264,
    H265,
    Vp9,
}

impl Codec {
    pub const ALL: [Codec; 4] = [Codec::Av1, Codec::H264, Codec::H265, Codec::Vp9];

    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Av1 => "AV1",
            Codec::H264 => "H264",
            Codec::H265 => "H265",
            Codec::Vp9 => "VP9",
        }
    }

    /// ffmpeg encoder library passed to `-c:v`.
    pub fn encoder_library(self) -> &'static str {
        match self {
            Codec::Av1 => "libsvtav1",
            Codec::H264 => "libx264",
            Codec::H265 => "libx265",
            Codec::Vp9 => "libvpx-vp9",
        }
    }

    /// Highest CRF the encoder library accepts.
    pub fn max_crf(self) -> u32 {
        match self {
            Codec::Av1 | Codec::Vp9 => 63,
            Codec::H264 | Codec::H265 => 51,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = ScenecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("HEVC") {
            return Ok(Codec::H265);
        }
        Codec::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                ScenecastError::config(format!(
                    "unknown codec '{s}'. Use one of: {}",
                    join_names(Codec::ALL.iter().map(|c| c.as_str()))
                ))
            })
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// Optional, loosely typed overrides for every configuration field.
///
/// Numbers are signed and codecs are strings so that bad input reaches
/// [`RenderConfig::resolve`] and is reported as a configuration error
/// instead of a parse failure. The same type is read from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOverrides {
    #[serde(alias = "blender_path")]
    pub renderer_path: Option<PathBuf>,
    pub encoder_path: Option<PathBuf>,
    pub input_script: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub fps: Option<i64>,
    /// Animation length in seconds.
    pub duration: Option<i64>,
    pub container: Option<String>,
    pub codec: Option<String>,
    pub crf: Option<i64>,
    pub frames_only: Option<bool>,
}

/// Fully resolved render configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderConfig {
    /// Renderer (Blender) executable.
    pub renderer_path: PathBuf,

    /// Encoder (ffmpeg) executable.
    pub encoder_path: PathBuf,

    /// Scene-generation script run inside the renderer.
    pub input_script: PathBuf,

    /// Final video file.
    pub output_path: PathBuf,

    /// Render resolution in pixels.
    pub width: u32,
    pub height: u32,

    /// Frames per second.
    pub fps: u32,

    /// Animation length in seconds.
    pub duration_secs: u32,

    pub container: Container,
    pub codec: Codec,

    /// Constant rate factor (lower is better quality).
    pub crf: u32,

    /// Stop after rendering frames; skip the encode step.
    pub frames_only: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            renderer_path: default_renderer_path(),
            encoder_path: PathBuf::from(DEFAULT_ENCODER_PATH),
            input_script: PathBuf::from(DEFAULT_INPUT_SCRIPT),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            duration_secs: DEFAULT_DURATION_SECS,
            container: Container::Mkv,
            codec: Codec::Av1,
            crf: DEFAULT_CRF,
            frames_only: false,
        }
    }
}

impl RenderConfig {
    /// Apply override layers over the defaults, in order, and validate.
    ///
    /// When no layer names a container, it follows the output extension
    /// (`.mp4` gives MP4), falling back to MKV for unknown extensions.
    pub fn resolve<'a, I>(layers: I) -> ScenecastResult<Self>
    where
        I: IntoIterator<Item = &'a RenderOverrides>,
    {
        let mut config = Self::default();
        let mut container_set = false;
        for layer in layers {
            container_set |= layer.container.is_some();
            config.apply(layer)?;
        }
        if !container_set {
            if let Some(container) = config
                .output_path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Container::from_extension)
            {
                config.container = container;
            }
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, overrides: &RenderOverrides) -> ScenecastResult<()> {
        if let Some(path) = &overrides.renderer_path {
            self.renderer_path = path.clone();
        }
        if let Some(path) = &overrides.encoder_path {
            self.encoder_path = path.clone();
        }
        if let Some(path) = &overrides.input_script {
            self.input_script = path.clone();
        }
        if let Some(path) = &overrides.output_path {
            self.output_path = path.clone();
        }
        if let Some(width) = overrides.width {
            self.width = positive("width", width)?;
        }
        if let Some(height) = overrides.height {
            self.height = positive("height", height)?;
        }
        if let Some(fps) = overrides.fps {
            self.fps = positive("fps", fps)?;
        }
        if let Some(duration) = overrides.duration {
            self.duration_secs = positive("duration", duration)?;
        }
        if let Some(container) = &overrides.container {
            self.container = container.parse()?;
        }
        if let Some(codec) = &overrides.codec {
            self.codec = codec.parse()?;
        }
        if let Some(crf) = overrides.crf {
            self.crf = u32::try_from(crf).map_err(|_| {
                ScenecastError::config(format!("crf must be a non-negative integer, got {crf}"))
            })?;
        }
        if let Some(frames_only) = overrides.frames_only {
            self.frames_only = frames_only;
        }
        Ok(())
    }

    /// Check ranges and cross-field constraints.
    pub fn validate(&self) -> ScenecastResult<()> {
        for (field, path) in [
            ("renderer path", &self.renderer_path),
            ("encoder path", &self.encoder_path),
            ("input script", &self.input_script),
            ("output path", &self.output_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ScenecastError::config(format!("{field} must not be empty")));
            }
        }
        if self.output_path.file_stem().is_none() {
            return Err(ScenecastError::config(format!(
                "output path '{}' does not name a file",
                self.output_path.display()
            )));
        }

        for (field, value) in [
            ("width", self.width),
            ("height", self.height),
            ("fps", self.fps),
            ("duration", self.duration_secs),
        ] {
            if value == 0 {
                return Err(ScenecastError::config(format!(
                    "{field} must be a positive integer, got 0"
                )));
            }
        }

        if self.fps.checked_mul(self.duration_secs).is_none() {
            return Err(ScenecastError::config(format!(
                "fps {} x duration {} exceeds the maximum frame count",
                self.fps, self.duration_secs
            )));
        }

        if self.crf > self.codec.max_crf() {
            return Err(ScenecastError::config(format!(
                "crf {} is out of range for {} (0-{})",
                self.crf,
                self.codec,
                self.codec.max_crf()
            )));
        }

        if !self.container.supports(self.codec) {
            return Err(ScenecastError::config(format!(
                "container {} cannot hold {} video",
                self.container, self.codec
            )));
        }

        Ok(())
    }

    /// Number of frames rendered: `fps * duration`.
    pub fn total_frames(&self) -> u32 {
        self.fps.saturating_mul(self.duration_secs)
    }
}

fn positive(field: &str, value: i64) -> ScenecastResult<u32> {
    if value <= 0 {
        return Err(ScenecastError::config(format!(
            "{field} must be a positive integer, got {value}"
        )));
    }
    u32::try_from(value)
        .map_err(|_| ScenecastError::config(format!("{field} is out of range: {value}")))
}
