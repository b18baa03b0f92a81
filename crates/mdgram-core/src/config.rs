//! Configuration management for mdgram.
//!
//! Loads configuration from ${MDGRAM_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Chunk sizing for the splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on raw chunk length, in characters. Kept below Telegram's
    /// 4096 limit so reopened and closed markers still fit.
    pub max_chunk_chars: usize,
    /// How far back from the hard boundary to look for a line break or space.
    pub lookback_chars: usize,
}

impl ChunkingConfig {
    pub const DEFAULT_MAX_CHUNK_CHARS: usize = 4000;
    pub const DEFAULT_LOOKBACK_CHARS: usize = 200;

    pub fn with_max_chunk_chars(max_chunk_chars: usize) -> Self {
        Self {
            max_chunk_chars,
            ..Self::default()
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: Self::DEFAULT_MAX_CHUNK_CHARS,
            lookback_chars: Self::DEFAULT_LOOKBACK_CHARS,
        }
    }
}

/// Telegram bot configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token for Telegram API.
    pub bot_token: Option<String>,
    /// Overrides the Bot API endpoint (self-hosted servers, tests).
    pub api_base_url: Option<String>,
    pub disable_link_preview: bool,
    /// Per-request timeout; 0 disables it.
    pub request_timeout_secs: u64,
}

impl TelegramConfig {
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: None,
            disable_link_preview: true,
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub telegram: TelegramConfig,
}

pub mod paths {
    //! Path resolution for mdgram configuration.
    //!
    //! MDGRAM_HOME resolution order:
    //! 1. MDGRAM_HOME environment variable (if set)
    //! 2. ~/.config/mdgram (default)

    use std::path::PathBuf;

    /// Returns the mdgram home directory.
    pub fn mdgram_home() -> PathBuf {
        if let Ok(home) = std::env::var("MDGRAM_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .unwrap_or_default()
            .join(".config")
            .join("mdgram")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        mdgram_home().join("config.toml")
    }
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes a default config file at `path`. Fails if one already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, &Self::generate()?)
    }

    /// Renders the default configuration as TOML.
    pub fn generate() -> Result<String> {
        toml::to_string_pretty(&Config::default())
            .context("Failed to serialize default config to TOML")
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.chunking.max_chunk_chars, 4000);
        assert_eq!(config.chunking.lookback_chars, 200);
        assert!(config.telegram.disable_link_preview);
        assert_eq!(config.telegram.bot_token, None);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "[chunking]\nmax_chunk_chars = 1000\n\n[telegram]\nbot_token = \"123:abc\"\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.chunking.max_chunk_chars, 1000);
        assert_eq!(config.chunking.lookback_chars, 200);
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(
            config.telegram.request_timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[chunking\n").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(format!("{err}").contains("Failed to parse config"));
    }

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        Config::init(&config_path).unwrap();
        assert_eq!(Config::load_from(&config_path).unwrap(), Config::default());

        let err = Config::init(&config_path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_request_timeout_zero_disables() {
        let telegram = TelegramConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(telegram.request_timeout(), None);
    }
}
