use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::events::ChatMode;

/// Main application configuration
///
/// Loaded once at session start and saved back on exit so toggles flipped
/// from inside the TUI (mode, search) survive restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Vaelis backend
    pub api_base_url: String,

    /// Bearer token attached to every request; `VAELIS_API_TOKEN` overrides
    pub api_token: Option<String>,

    /// Mode the composer starts in
    pub default_mode: ChatMode,

    /// Whether web search is requested for new generations
    pub use_search: bool,

    /// Vaelis home directory
    pub vaelis_home: PathBuf,

    /// Streaming behavior
    pub stream: StreamConfig,

    /// UI preferences
    pub ui: UiConfig,
}

/// Stream consumer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Seconds without any chunk or end marker before the session errors out
    pub idle_timeout_secs: u64,

    /// Upper bound on accumulated response text, in bytes
    pub max_output_bytes: usize,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub theme: String,
    pub show_timestamps: bool,
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
        let vaelis_home = home.join(".vaelis");

        Config {
            api_base_url: "https://api.vaelis.app".to_string(),
            api_token: None,
            default_mode: ChatMode::Chat,
            use_search: false,
            vaelis_home,
            stream: StreamConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            idle_timeout_secs: 90,
            max_output_bytes: 4 * 1024 * 1024,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            theme: "dark".to_string(),
            show_timestamps: true,
            history_limit: 200,
        }
    }
}

impl Config {
    /// Load configuration from ~/.vaelis/config.toml, creating defaults if absent
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let vaelis_home = home.join(".vaelis");
        let config_path = vaelis_home.join("config.toml");

        fs::create_dir_all(&vaelis_home)
            .context("Failed to create .vaelis directory")?;

        let mut config: Config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.vaelis_home = vaelis_home;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.vaelis_home)
            .context("Failed to create .vaelis directory")?;
        let config_path = self.vaelis_home.join("config.toml");
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Check if a bearer token is configured
    pub fn has_token(&self) -> bool {
        self.api_token.is_some() || std::env::var("VAELIS_API_TOKEN").is_ok()
    }

    /// Get the bearer token from config or environment
    pub fn token(&self) -> Option<String> {
        std::env::var("VAELIS_API_TOKEN")
            .ok()
            .or_else(|| self.api_token.clone())
    }

    /// Update the bearer token
    pub fn set_token(&mut self, token: String) {
        self.api_token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let config: Config = toml::from_str("api_base_url = \"http://localhost:9000\"").unwrap();
        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.stream.idle_timeout_secs, 90);
        assert_eq!(config.default_mode, ChatMode::Chat);
        assert!(!config.use_search);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.use_search = true;
        config.default_mode = ChatMode::Code;
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert!(parsed.use_search);
        assert_eq!(parsed.default_mode, ChatMode::Code);
    }
}
