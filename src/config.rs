use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::game::engine::{DEFAULT_COMPLEXITY, MAX_COMPLEXITY, MIN_COMPLEXITY};

pub const APP_DIR: &str = "beat-lanes";
pub const LOCAL_CONFIG: &str = "beat-lanes.toml";
pub const HISTORY_FILE: &str = "history.json";
pub const HIGH_SCORE_FILE: &str = "tiles-high-score";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    #[serde(default = "default_complexity")]
    pub complexity: f32,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            complexity: default_complexity(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

fn default_sensitivity() -> f32 { 0.5 }
fn default_complexity() -> f32 { DEFAULT_COMPLEXITY }
fn default_volume() -> f32 { 1.0 }

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Invalid config file")?;
        config.clamp();
        Ok(config)
    }

    /// CLI values, when given, win over the file.
    pub fn apply_overrides(
        &mut self,
        sensitivity: Option<f32>,
        complexity: Option<f32>,
        data_dir: Option<PathBuf>,
    ) {
        if let Some(s) = sensitivity {
            self.game.sensitivity = s;
        }
        if let Some(c) = complexity {
            self.game.complexity = c;
        }
        if data_dir.is_some() {
            self.data_dir = data_dir;
        }
        self.clamp();
    }

    fn clamp(&mut self) {
        self.game.sensitivity = self.game.sensitivity.clamp(0.0, 1.0);
        self.game.complexity = self.game.complexity.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY);
        self.audio.volume = self.audio.volume.clamp(0.0, 1.0);
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir().join(HISTORY_FILE)
    }

    pub fn high_score_path(&self) -> PathBuf {
        self.data_dir().join(HIGH_SCORE_FILE)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Explicit path, then `./beat-lanes.toml`, then the platform config dir.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join("config.toml"))
        .filter(|path| path.exists())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Finds and loads the config, or falls back to defaults when none exists.
pub fn resolve(explicit: Option<&Path>) -> Result<Config> {
    match find_config(explicit) {
        Some(path) => load_config(&path),
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.game.sensitivity, 0.5);
        assert_eq!(config.game.complexity, 0.2);
        assert_eq!(config.audio.volume, 1.0);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn partial_sections_fill_in() {
        let config = Config::from_toml(
            r#"
            data_dir = "/tmp/lanes"

            [game]
            complexity = 0.15
            "#,
        )
        .unwrap();
        assert_eq!(config.game.sensitivity, 0.5);
        assert_eq!(config.game.complexity, 0.15);
        assert_eq!(config.history_path(), PathBuf::from("/tmp/lanes/history.json"));
        assert_eq!(config.high_score_path(), PathBuf::from("/tmp/lanes/tiles-high-score"));
    }

    #[test]
    fn values_are_clamped() {
        let config = Config::from_toml("[game]\nsensitivity = 4.0\ncomplexity = 0.01\n").unwrap();
        assert_eq!(config.game.sensitivity, 1.0);
        assert_eq!(config.game.complexity, MIN_COMPLEXITY);
    }

    #[test]
    fn cli_overrides_file() {
        let mut config = Config::from_toml("[game]\nsensitivity = 0.2\n").unwrap();
        config.apply_overrides(Some(0.9), None, Some(PathBuf::from("/data")));
        assert_eq!(config.game.sensitivity, 0.9);
        assert_eq!(config.game.complexity, 0.2);
        assert_eq!(config.data_dir(), PathBuf::from("/data"));
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(Config::from_toml("[game\nsensitivity = ").is_err());
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[audio]\nvolume = 0.5\n").unwrap();
        let config = resolve(Some(&path)).unwrap();
        assert_eq!(config.audio.volume, 0.5);

        let missing = dir.path().join("missing.toml");
        assert!(resolve(Some(&missing)).is_err());
    }
}
