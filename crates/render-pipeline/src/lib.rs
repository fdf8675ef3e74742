//! SceneCast Render Pipeline
//!
//! Drives an external renderer (Blender) headlessly over a procedural
//! scene script, then hands the rendered frames to an external encoder
//! (ffmpeg).
//!
//! # Pipeline Architecture
//!
//! ```text
//! defaults ──┐
//! settings ──┼── RenderConfig (validated)
//! flags ─────┘         │
//!                      ▼
//!        blender --background --python scene.py --render-anim
//!                      │
//!                      ▼
//!          render/movie_frames/frame_#####.png
//!                      │
//!                      ▼
//!        ffmpeg -i frame_%05d.png -c:v <codec> -crf <n>
//!                      │
//!                      ▼
//!               render/movie.mkv
//! ```

pub mod config;
pub mod invocation;
pub mod layout;
pub mod pipeline;
pub mod process;
pub mod report;

pub use config::{Codec, Container, RenderConfig, RenderOverrides};
pub use invocation::Invocation;
pub use layout::ArtifactLayout;
pub use pipeline::{PipelinePlan, RenderPipeline, StageRecord};
pub use process::{CommandRunner, ProcessOutcome, SystemRunner};
pub use report::{RunReport, RunStatus};
