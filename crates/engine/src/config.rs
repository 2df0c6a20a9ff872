use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Output stream and mixer sizing, read from `engine.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Preferred output rate. The device default is used when it can't be met.
    pub sample_rate: u32,
    pub channels: u16,
    /// Most handles the mixer will sound at once.
    pub max_play_handles: usize,
    pub command_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            max_play_handles: 256,
            command_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cliptrack").join("engine.toml"))
    }

    /// Load from the user config directory, falling back to defaults.
    pub fn load_default() -> Self {
        match Self::config_path() {
            Some(path) => Self::load(&path),
            None => Self::default(),
        }
    }

    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return Self::default(),
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring invalid engine config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
