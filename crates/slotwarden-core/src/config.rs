//! Slotwarden configuration system.
//!
//! Static TOML configuration loaded once at startup: the bridge connection,
//! the target group, and the recurring poll tracks.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlotwardenError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotwardenConfig {
    /// Group the bot operates in (platform chat id).
    pub group_id: String,
    /// IANA timezone all cron schedules are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
}

fn default_timezone() -> String {
    "America/Belem".into()
}

/// Connection to the WhatsApp session bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bridge session name.
    #[serde(default = "default_session")]
    pub session: String,
    /// Bearer token for the bridge API.
    #[serde(default)]
    pub token: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:21465".into()
}
fn default_session() -> String {
    "slotwarden".into()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session: default_session(),
            token: String::new(),
        }
    }
}

/// One recurring poll slot (e.g. morning, afternoon, saturday).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Track name, used in logs and job names.
    pub name: String,
    /// Poll question; `{date}` expands to tomorrow's date (DD/MM/YYYY).
    pub question: String,
    /// Options offered on the poll, in display order.
    pub options: Vec<String>,
    /// Maximum accepted votes per option before it closes.
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// When to replace the poll with a fresh one.
    pub reset_cron: String,
    /// How often to re-read the votes of the active poll.
    #[serde(default = "default_check_cron")]
    pub check_cron: String,
}

fn default_capacity() -> u32 {
    1
}
fn default_check_cron() -> String {
    "*/1 * * * *".into()
}

impl SlotwardenConfig {
    /// Load config from the default path (~/.slotwarden/config.toml).
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SlotwardenError::Config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SlotwardenError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SlotwardenError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".slotwarden")
            .join("config.toml")
    }

    /// Reject configs the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.group_id.is_empty() {
            return Err(SlotwardenError::Config("group_id is required".into()));
        }
        if self.tracks.is_empty() {
            return Err(SlotwardenError::Config("at least one [[tracks]] entry is required".into()));
        }
        for track in &self.tracks {
            if track.name.is_empty() {
                return Err(SlotwardenError::Config("track name is required".into()));
            }
            if track.options.is_empty() {
                return Err(SlotwardenError::Config(format!(
                    "track '{}' has no options",
                    track.name
                )));
            }
            if track.capacity == 0 {
                return Err(SlotwardenError::Config(format!(
                    "track '{}': capacity must be at least 1",
                    track.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SlotwardenConfig {
        toml::from_str(
            r#"
            group_id = "123456789@g.us"

            [[tracks]]
            name = "morning"
            question = "Which slot for {date}?"
            options = ["6h", "7h", "8h", "9h"]
            reset_cron = "0 20 * * *"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_fill_in() {
        let config = sample();
        assert_eq!(config.timezone, "America/Belem");
        assert_eq!(config.bridge.base_url, "http://127.0.0.1:21465");
        assert_eq!(config.tracks[0].capacity, 1);
        assert_eq!(config.tracks[0].check_cron, "*/1 * * * *");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = sample();
        config.tracks[0].capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_options() {
        let mut config = sample();
        config.tracks[0].options.clear();
        assert!(config.validate().is_err());
    }
}
