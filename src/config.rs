//! Configuration types for the bot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::trigger::MarkerPolicy;

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram API settings.
    pub telegram: TelegramConfig,
    /// Content API settings (page metadata, random ayah).
    pub content: ContentConfig,
    /// Scheduler loop settings.
    pub scheduler: SchedulerConfig,
    /// Trigger idempotency settings.
    pub trigger: TriggerConfig,
    /// State persistence settings.
    pub state: StateConfig,
}

/// Telegram Bot API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token. Overridden by `WIRD_BOT_TOKEN` when set.
    pub token: String,
    /// API base URL. Only changed in tests.
    pub api_base: String,
    /// Per-request timeout in seconds for sends and membership queries.
    pub request_timeout_secs: u64,
    /// Long-poll timeout in seconds for `getUpdates`.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: "https://api.telegram.org".to_owned(),
            request_timeout_secs: 20,
            poll_timeout_secs: 30,
        }
    }
}

/// Content API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Base URL of the alquran.cloud-compatible REST API.
    pub api_base: String,
    /// Per-request timeout in seconds. Lookups are best-effort; failures
    /// degrade to placeholders rather than blocking a delivery.
    pub request_timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.alquran.cloud/v1".to_owned(),
            request_timeout_secs: 15,
        }
    }
}

/// Scheduler loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between ticks. Must stay at or below 60 so a configured
    /// minute is never skipped.
    pub tick_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
        }
    }
}

/// Trigger idempotency configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Marker granularity: `exact-minute` (default) allows several
    /// deliveries per day at distinct configured times; `once-per-day`
    /// caps each delivery type at one per calendar day.
    pub marker_policy: MarkerPolicy,
}

/// State persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path of the JSON state file.
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_wird_dir().join("state.json"),
        }
    }
}

fn default_wird_dir() -> PathBuf {
    if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(config).join("wird")
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".config").join("wird")
    } else {
        PathBuf::from("/tmp/wird")
    }
}

impl BotConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| crate::WirdError::Config(e.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::WirdError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/wird/config.toml`.
    pub fn default_config_path() -> PathBuf {
        default_wird_dir().join("config.toml")
    }

    /// Pull the bot token from the environment when present.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("WIRD_BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.telegram.token = token;
            }
        }
    }

    /// Reject configurations the scheduler cannot honour.
    pub fn validate(&self) -> crate::Result<()> {
        if self.scheduler.tick_interval_secs == 0 || self.scheduler.tick_interval_secs > 60 {
            return Err(crate::WirdError::Config(format!(
                "tick_interval_secs must be in [1, 60], got {}",
                self.scheduler.tick_interval_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BotConfig::default();
        config.validate().unwrap();
        assert!(config.scheduler.tick_interval_secs <= 60);
        assert!(config.telegram.request_timeout_secs > 0);
        assert!(config.content.api_base.starts_with("https://"));
        assert_eq!(config.trigger.marker_policy, MarkerPolicy::ExactMinute);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = BotConfig::default();
        config.scheduler.tick_interval_secs = 45;
        config.trigger.marker_policy = MarkerPolicy::OncePerDay;
        config.save_to_file(&path).unwrap();

        let loaded = BotConfig::from_file(&path).unwrap();
        assert_eq!(loaded.scheduler.tick_interval_secs, 45);
        assert_eq!(loaded.trigger.marker_policy, MarkerPolicy::OncePerDay);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\ntick_interval_secs = 60\n").unwrap();

        let loaded = BotConfig::from_file(&path).unwrap();
        assert_eq!(loaded.scheduler.tick_interval_secs, 60);
        assert_eq!(loaded.telegram.api_base, "https://api.telegram.org");
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let mut config = BotConfig::default();
        config.scheduler.tick_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_tick_interval_is_rejected() {
        let mut config = BotConfig::default();
        config.scheduler.tick_interval_secs = 300;
        assert!(config.validate().is_err());
    }
}
