//! TOML-based application configuration.
//!
//! Stores user preferences:
//! - Work interval length in minutes
//! - Notification sound and haptic settings
//!
//! Configuration is stored at `~/.config/floato/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{MAX_WORK_SECONDS, MIN_WORK_SECONDS};

/// Shortest selectable work interval, in minutes.
pub const MIN_WORK_MINUTES: u32 = MIN_WORK_SECONDS / 60;
/// Longest selectable work interval, in minutes.
pub const MAX_WORK_MINUTES: u32 = MAX_WORK_SECONDS / 60;

/// Timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
}

/// Notification sound choice. Delivery is the frontend's concern; the core
/// only persists the preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSound {
    Glass,
    Ping,
    Submarine,
    Silent,
}

impl NotificationSound {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSound::Glass => "glass",
            NotificationSound::Ping => "ping",
            NotificationSound::Submarine => "submarine",
            NotificationSound::Silent => "silent",
        }
    }
}

impl std::fmt::Display for NotificationSound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationSound {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "glass" => Ok(NotificationSound::Glass),
            "ping" => Ok(NotificationSound::Ping),
            "submarine" => Ok(NotificationSound::Submarine),
            "silent" => Ok(NotificationSound::Silent),
            other => Err(ConfigError::InvalidValue {
                key: "notifications.sound".to_string(),
                message: format!("unknown sound: {other}"),
            }),
        }
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sound")]
    pub sound: NotificationSound,
    #[serde(default = "default_true")]
    pub haptics: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/floato/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

fn default_work_minutes() -> u32 {
    25
}
fn default_true() -> bool {
    true
}
fn default_sound() -> NotificationSound {
    NotificationSound::Glass
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: NotificationSound::Glass,
            haptics: true,
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning the default on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Current work interval in seconds.
    pub fn work_seconds(&self) -> u32 {
        self.timer.work_minutes * 60
    }

    /// Update the work interval, enforcing the 1..=60 minute range. Applies
    /// to the next countdown, never an in-progress one.
    pub fn set_work_minutes(&mut self, minutes: u32) -> Result<(), ConfigError> {
        if !(MIN_WORK_MINUTES..=MAX_WORK_MINUTES).contains(&minutes) {
            return Err(ConfigError::InvalidValue {
                key: "timer.work_minutes".to_string(),
                message: format!(
                    "must be between {MIN_WORK_MINUTES} and {MAX_WORK_MINUTES}, got {minutes}"
                ),
            });
        }
        self.timer.work_minutes = minutes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timer.work_minutes, 25);
        assert!(parsed.notifications.enabled);
        assert_eq!(parsed.notifications.sound, NotificationSound::Glass);
        assert!(parsed.notifications.haptics);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\nwork_minutes = 45\n").unwrap();
        assert_eq!(parsed.timer.work_minutes, 45);
        assert!(parsed.notifications.enabled);
    }

    #[test]
    fn work_minutes_bounds_are_enforced() {
        let mut cfg = Config::default();
        assert!(cfg.set_work_minutes(0).is_err());
        assert!(cfg.set_work_minutes(61).is_err());
        cfg.set_work_minutes(1).unwrap();
        assert_eq!(cfg.work_seconds(), 60);
        cfg.set_work_minutes(60).unwrap();
        assert_eq!(cfg.work_seconds(), 3600);
    }

    #[test]
    fn sound_serializes_lowercase() {
        let cfg = Config {
            notifications: NotificationsConfig {
                sound: NotificationSound::Submarine,
                ..Default::default()
            },
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        assert!(toml_str.contains("sound = \"submarine\""));
    }
}
