//! Settings file discovery and logging configuration.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ScenecastError, ScenecastResult};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "scenecast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

/// Standard settings file location.
pub fn settings_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("scenecast").join("config.json")
}

/// Load settings, preferring an explicitly requested file over the
/// standard location.
pub fn load_settings<T>(explicit: Option<&Path>) -> ScenecastResult<T>
where
    T: DeserializeOwned + Default,
{
    load_settings_with_fallback(explicit, &settings_file_path())
}

/// Load settings from `explicit` if given, otherwise from `fallback` when it
/// exists.
///
/// An explicit file that is missing or malformed is a configuration error.
/// A broken fallback file is only warned about, and defaults are used.
pub fn load_settings_with_fallback<T>(explicit: Option<&Path>, fallback: &Path) -> ScenecastResult<T>
where
    T: DeserializeOwned + Default,
{
    if let Some(path) = explicit {
        return read_json_file(path).map_err(|e| {
            ScenecastError::config(format!(
                "failed to load settings from '{}': {e}",
                path.display()
            ))
        });
    }

    if !fallback.exists() {
        return Ok(T::default());
    }

    match read_json_file(fallback) {
        Ok(settings) => {
            tracing::debug!(path = %fallback.display(), "Loaded settings file");
            Ok(settings)
        }
        Err(e) => {
            tracing::warn!("Failed to load settings at {:?}: {}", fallback, e);
            Ok(T::default())
        }
    }
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> ScenecastResult<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    #[serde(default)]
    struct Sample {
        width: Option<i64>,
        codec: Option<String>,
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"width": 1280, "codec": "H264"}"#).unwrap();

        let loaded: Sample = load_settings_with_fallback(Some(&path), Path::new("/nonexistent")).unwrap();
        assert_eq!(loaded.width, Some(1280));
        assert_eq!(loaded.codec.as_deref(), Some("H264"));
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = load_settings_with_fallback::<Sample>(Some(&path), Path::new("/nonexistent"))
            .unwrap_err();
        assert!(matches!(err, ScenecastError::Config { .. }));
    }

    #[test]
    fn test_malformed_explicit_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ width: ").unwrap();

        let err = load_settings_with_fallback::<Sample>(Some(&path), Path::new("/nonexistent"))
            .unwrap_err();
        assert!(matches!(err, ScenecastError::Config { .. }));
    }

    #[test]
    fn test_malformed_fallback_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("config.json");
        std::fs::write(&fallback, "not json").unwrap();

        let loaded: Sample = load_settings_with_fallback(None, &fallback).unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_absent_fallback_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Sample =
            load_settings_with_fallback(None, &dir.path().join("config.json")).unwrap();
        assert_eq!(loaded, Sample::default());
    }
}
