//! Frame hand-off naming convention between the render and encode steps.
//!
//! For an output path `<dir>/<stem>.<ext>` the renderer writes PNG frames
//! into `<dir>/<stem>_frames/` and the encoder reads them back from there:
//!
//! ```text
//! render/movie.mkv
//! render/movie_frames/frame_00001.png
//! render/movie_frames/frame_00002.png
//! ...
//! ```

use std::path::{Path, PathBuf};

use scenecast_common::error::ScenecastResult;
use serde::Serialize;

use crate::config::RenderConfig;

pub const FRAME_PREFIX: &str = "frame_";
pub const FRAME_EXTENSION: &str = "png";
/// First frame number; Blender scenes are 1-based.
pub const FIRST_FRAME: u32 = 1;
const FRAME_DIGITS: usize = 5;

/// Resolved locations of the intermediate and final artifacts of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactLayout {
    /// Absolute directory receiving rendered frames.
    pub frames_dir: PathBuf,

    /// Final video path, exactly as configured.
    pub output_path: PathBuf,

    /// Number of frames the renderer is asked for.
    pub total_frames: u32,
}

impl ArtifactLayout {
    /// Derive the layout for `config`, resolving relative paths against
    /// `work_dir`.
    pub fn new(config: &RenderConfig, work_dir: &Path) -> Self {
        let output = &config.output_path;
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "movie".to_string());
        let parent = output.parent().unwrap_or_else(|| Path::new(""));

        Self {
            frames_dir: work_dir.join(parent).join(format!("{stem}_frames")),
            output_path: output.clone(),
            total_frames: config.total_frames(),
        }
    }

    /// Output pattern handed to Blender; `#` runs are replaced by the
    /// zero-padded frame number and the extension is appended.
    pub fn render_output_pattern(&self) -> PathBuf {
        self.frames_dir
            .join(format!("{FRAME_PREFIX}{}", "#".repeat(FRAME_DIGITS)))
    }

    /// Input pattern handed to ffmpeg's image2 demuxer.
    pub fn encoder_input_pattern(&self) -> PathBuf {
        self.frames_dir
            .join(format!("{FRAME_PREFIX}%0{FRAME_DIGITS}d.{FRAME_EXTENSION}"))
    }

    /// Path of a single rendered frame.
    pub fn frame_path(&self, frame: u32) -> PathBuf {
        self.frames_dir.join(format!(
            "{FRAME_PREFIX}{frame:0width$}.{FRAME_EXTENSION}",
            width = FRAME_DIGITS
        ))
    }

    /// The frames whose presence proves the render step completed.
    pub fn expected_frames(&self) -> Vec<PathBuf> {
        let last = FIRST_FRAME + self.total_frames.saturating_sub(1);
        if last == FIRST_FRAME {
            vec![self.frame_path(FIRST_FRAME)]
        } else {
            vec![self.frame_path(FIRST_FRAME), self.frame_path(last)]
        }
    }

    /// First expected frame that does not exist on disk.
    pub fn first_missing_frame(&self) -> Option<PathBuf> {
        self.expected_frames().into_iter().find(|p| !p.is_file())
    }

    /// Whether `name` follows the frame naming convention.
    pub fn is_frame_file(name: &str) -> bool {
        name.strip_prefix(FRAME_PREFIX)
            .and_then(|rest| rest.strip_suffix(FRAME_EXTENSION))
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Create the frames directory and the output's parent directory, and
    /// remove frames left over from an earlier run so they cannot stand in
    /// for this run's output.
    pub fn prepare(&self, work_dir: &Path) -> ScenecastResult<usize> {
        std::fs::create_dir_all(&self.frames_dir)?;
        if let Some(parent) = self.output_path.parent() {
            std::fs::create_dir_all(work_dir.join(parent))?;
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.frames_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let is_stale = name.to_str().is_some_and(Self::is_frame_file);
            if is_stale && entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(
                removed,
                dir = %self.frames_dir.display(),
                "Removed stale frames from a previous run"
            );
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderOverrides;

    fn layout_for(output: &str, fps: i64, duration: i64) -> ArtifactLayout {
        let config = RenderConfig::resolve([&RenderOverrides {
            output_path: Some(output.into()),
            fps: Some(fps),
            duration: Some(duration),
            ..Default::default()
        }])
        .unwrap();
        ArtifactLayout::new(&config, Path::new("/work"))
    }

    #[test]
    fn test_frames_dir_sits_next_to_output() {
        let layout = layout_for("render/movie.mkv", 60, 60);
        assert_eq!(layout.frames_dir, PathBuf::from("/work/render/movie_frames"));
        assert_eq!(layout.output_path, PathBuf::from("render/movie.mkv"));
        assert_eq!(layout.total_frames, 3600);
    }

    #[test]
    fn test_absolute_output_ignores_work_dir() {
        let layout = layout_for("/srv/out/clip.mp4", 30, 1);
        assert_eq!(layout.frames_dir, PathBuf::from("/srv/out/clip_frames"));
    }

    #[test]
    fn test_bare_file_name_output() {
        let layout = layout_for("clip.mp4", 30, 1);
        assert_eq!(layout.frames_dir, PathBuf::from("/work/clip_frames"));
    }

    #[test]
    fn test_render_and_encode_patterns_agree() {
        let layout = layout_for("render/movie.mkv", 24, 2);
        assert_eq!(
            layout.render_output_pattern(),
            PathBuf::from("/work/render/movie_frames/frame_#####")
        );
        assert_eq!(
            layout.encoder_input_pattern(),
            PathBuf::from("/work/render/movie_frames/frame_%05d.png")
        );
        assert_eq!(
            layout.frame_path(7),
            PathBuf::from("/work/render/movie_frames/frame_00007.png")
        );
    }

    #[test]
    fn test_expected_frames_are_first_and_last() {
        let layout = layout_for("render/movie.mkv", 24, 2);
        assert_eq!(
            layout.expected_frames(),
            vec![layout.frame_path(1), layout.frame_path(48)]
        );

        let single = layout_for("render/movie.mkv", 1, 1);
        assert_eq!(single.expected_frames(), vec![single.frame_path(1)]);
    }

    #[test]
    fn test_frame_file_names() {
        assert!(ArtifactLayout::is_frame_file("frame_00001.png"));
        assert!(ArtifactLayout::is_frame_file("frame_123456.png"));
        assert!(!ArtifactLayout::is_frame_file("frame_.png"));
        assert!(!ArtifactLayout::is_frame_file("frame_0001.jpg"));
        assert!(!ArtifactLayout::is_frame_file("notes.txt"));
        assert!(!ArtifactLayout::is_frame_file("frame_01a.png"));
    }

    #[test]
    fn test_prepare_creates_dirs_and_clears_stale_frames() {
        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig::resolve([&RenderOverrides {
            output_path: Some("out/final/movie.mkv".into()),
            fps: Some(1),
            duration: Some(2),
            ..Default::default()
        }])
        .unwrap();
        let layout = ArtifactLayout::new(&config, dir.path());

        std::fs::create_dir_all(&layout.frames_dir).unwrap();
        std::fs::write(layout.frame_path(1), b"old").unwrap();
        std::fs::write(layout.frame_path(2), b"old").unwrap();
        std::fs::write(layout.frames_dir.join("keep.txt"), b"notes").unwrap();

        let removed = layout.prepare(dir.path()).unwrap();

        assert_eq!(removed, 2);
        assert!(dir.path().join("out/final").is_dir());
        assert!(layout.frames_dir.join("keep.txt").is_file());
        assert_eq!(layout.first_missing_frame(), Some(layout.frame_path(1)));
    }

    #[test]
    fn test_first_missing_frame_checks_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig::resolve([&RenderOverrides {
            output_path: Some("movie.mkv".into()),
            fps: Some(2),
            duration: Some(2),
            ..Default::default()
        }])
        .unwrap();
        let layout = ArtifactLayout::new(&config, dir.path());
        layout.prepare(dir.path()).unwrap();

        std::fs::write(layout.frame_path(1), b"png").unwrap();
        assert_eq!(layout.first_missing_frame(), Some(layout.frame_path(4)));

        std::fs::write(layout.frame_path(4), b"png").unwrap();
        assert_eq!(layout.first_missing_frame(), None);
    }
}
