/// Player configuration
use crate::error::{CliError, Result};
use encore_audio_desktop::OutputSettings;
use encore_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "encore.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_url")]
    pub url: String,

    /// Bearer token from `encore login`
    #[serde(default)]
    pub token: Option<String>,

    /// Save audiobook position when leaving a chapter or quitting
    #[serde(default = "default_save_progress")]
    pub save_audiobook_progress: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; the default file is optional. Variables
    /// prefixed `ENCORE_` override file values, `__` separating sections
    /// (`ENCORE_SERVER__TOKEN`, `ENCORE_PLAYBACK__VOLUME`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("ENCORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            return Err(CliError::Config(
                "Server URL is required (set ENCORE_SERVER__URL)".to_string(),
            ));
        }

        let volume = self.playback.volume;
        if !(0.0..=1.0).contains(&volume) {
            return Err(CliError::Config(format!(
                "Volume must be between 0.0 and 1.0, got {}",
                volume
            )));
        }

        Ok(())
    }
}

fn default_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_save_progress() -> bool {
    true
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: None,
            save_audiobook_progress: default_save_progress(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.playback.volume, 0.5);
        assert!(config.server.token.is_none());
    }

    #[test]
    fn out_of_range_volume_rejected() {
        let mut config = AppConfig::default();
        config.playback.volume = 1.5;
        assert!(matches!(config.validate(), Err(CliError::Config(_))));
    }

    #[test]
    fn empty_url_rejected() {
        let mut config = AppConfig::default();
        config.server.url = "  ".into();
        assert!(config.validate().is_err());
    }
}
