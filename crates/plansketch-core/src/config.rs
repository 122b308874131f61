//! Engine configuration.

use crate::canvas::DEFAULT_TITLE;
use crate::shapes::{Rgb, ValidationError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding [`EngineConfig::data_dir`].
pub const ENV_DATA_DIR: &str = "PLANSKETCH_DATA_DIR";
/// Environment variable overriding [`EngineConfig::auto_save`].
pub const ENV_AUTO_SAVE: &str = "PLANSKETCH_AUTO_SAVE";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid background color: {0}")]
    Background(#[from] ValidationError),
    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },
}

/// Settings for a sketching session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Push the plan after every sealed stroke while bound to a plan.
    pub auto_save: bool,
    /// Strokes sealed within this window share one auto-save.
    pub autosave_debounce_ms: u64,
    pub default_title: String,
    pub default_description: String,
    /// Simplify sealed freehand paths by their smoothing factor.
    pub simplify_paths: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Canvas background as `#rrggbb`.
    pub background: String,
    /// Directory of the file plan store; the platform data dir when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            autosave_debounce_ms: 0,
            default_title: DEFAULT_TITLE.to_string(),
            default_description: String::new(),
            simplify_paths: false,
            viewport_width: 1200,
            viewport_height: 800,
            background: "#ffffff".to_string(),
            data_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file, falling back to defaults when it does not
    /// exist, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                log::info!("Config {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env_with(|var| std::env::var(var).ok())?;
        config.background_color()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&json)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Apply `PLANSKETCH_*` overrides read through `lookup`.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup(ENV_AUTO_SAVE) {
            self.auto_save = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::Env { var: ENV_AUTO_SAVE, value }),
            };
        }
        Ok(())
    }

    pub fn background_color(&self) -> Result<Rgb, ValidationError> {
        Rgb::from_hex(&self.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(EngineConfig::from_file(&missing), Err(ConfigError::Read { .. })));

        let config = EngineConfig::load(Some(&missing)).unwrap();
        assert_eq!(config.default_title, DEFAULT_TITLE);
        assert_eq!(config.viewport_width, 1200);
        assert!(!config.simplify_paths);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"auto_save": false, "viewport_width": 640}"#).unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert!(!config.auto_save);
        assert_eq!(config.viewport_width, 640);
        assert_eq!(config.default_title, DEFAULT_TITLE);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_env_with(|var| match var {
                ENV_DATA_DIR => Some("/tmp/plans".to_string()),
                ENV_AUTO_SAVE => Some("off".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/plans")));
        assert!(!config.auto_save);

        let err = config.apply_env_with(|var| (var == ENV_AUTO_SAVE).then(|| "maybe".to_string()));
        assert!(matches!(err, Err(ConfigError::Env { .. })));
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(EngineConfig::from_file(&path), Err(ConfigError::Parse { .. })));
    }
}
