//! Error types shared across SceneCast crates.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Exit code for unexpected I/O or internal failures.
pub const EXIT_INTERNAL: u8 = 1;
/// Exit code for configuration errors (invalid flags, missing scene script).
pub const EXIT_CONFIG: u8 = 2;
/// Exit code when the renderer fails or cannot be started.
pub const EXIT_RENDER: u8 = 3;
/// Exit code when the render step produced no frames.
pub const EXIT_MISSING_ARTIFACT: u8 = 4;
/// Exit code when the encoder fails or cannot be started.
pub const EXIT_ENCODE: u8 = 5;

/// A pipeline stage backed by an external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Render,
    Encode,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Render => "render",
            Stage::Encode => "encode",
        }
    }

    /// Name of the external tool driving this stage, for messages.
    pub fn tool(self) -> &'static str {
        match self {
            Stage::Render => "renderer",
            Stage::Encode => "encoder",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for SceneCast operations.
#[derive(Debug, thiserror::Error)]
pub enum ScenecastError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input script not found: {}", path.display())]
    ScriptNotFound { path: PathBuf },

    #[error("{} executable not found at '{}'", stage.tool(), path.display())]
    ExecutableNotFound { stage: Stage, path: PathBuf },

    #[error("failed to start {} '{}': {source}", stage.tool(), path.display())]
    SpawnFailed {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{} exited with {}{}",
        stage.tool(),
        describe_exit(*exit_code),
        last_line_suffix(stderr)
    )]
    ProcessFailed {
        stage: Stage,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Missing render artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ScenecastError.
pub type ScenecastResult<T> = Result<T, ScenecastError>;

impl ScenecastError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn process_failed(stage: Stage, exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::ProcessFailed {
            stage,
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Process exit code reported to the invoking shell or CI system.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } | Self::ScriptNotFound { .. } => EXIT_CONFIG,
            Self::ExecutableNotFound { stage, .. }
            | Self::SpawnFailed { stage, .. }
            | Self::ProcessFailed { stage, .. } => {
                match stage {
                    Stage::Render => EXIT_RENDER,
                    Stage::Encode => EXIT_ENCODE,
                }
            }
            Self::MissingArtifact { .. } => EXIT_MISSING_ARTIFACT,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => EXIT_INTERNAL,
        }
    }
}

fn describe_exit(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn last_line_suffix(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(|line| format!(": {line}"))
        .unwrap_or_default()
}
