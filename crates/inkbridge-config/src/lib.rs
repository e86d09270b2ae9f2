use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Rendering engine hosting the editable surface.
///
/// Engines differ in which native events they deliver; the engine crate turns
/// this into a capability table once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurfaceEngine {
    #[default]
    Blink,
    Gecko,
    Webkit,
    /// Engines without structured `beforeinput` events
    Legacy,
}

fn default_debounce_ms() -> u64 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Text shown while the document is a single empty block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    /// Window within which native selection changes are resolved once
    #[serde(default = "default_debounce_ms")]
    pub selection_debounce_ms: u64,
    #[serde(default)]
    pub engine: SurfaceEngine,
    /// Use the Apple keymap (cmd/opt chords) for the fallback hotkey table
    #[serde(default)]
    pub apple_keymap: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            placeholder: None,
            read_only: false,
            selection_debounce_ms: default_debounce_ms(),
            engine: SurfaceEngine::default(),
            apple_keymap: false,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/inkbridge");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    pub fn selection_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.selection_debounce_ms)
    }
}
