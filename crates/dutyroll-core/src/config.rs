//! Dutyroll configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DutyrollError, Result};
use crate::types::TriggerSlot;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DutyrollConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl DutyrollConfig {
    /// Load config from the default path (~/.dutyroll/config.toml), then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DutyrollError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| DutyrollError::Config(format!("Failed to parse config: {e}")))?;
        config.notification.default_slot()?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DutyrollError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Dutyroll home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dutyroll")
    }

    /// `DUTYROLL_*` environment variables win over the file.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("DUTYROLL_BOT_TOKEN").filter(|t| !t.is_empty()) {
            self.telegram.bot_token = token;
            self.telegram.enabled = true;
        }
        if let Some(chat_id) = lookup("DUTYROLL_CHAT_ID") {
            self.telegram.chat_id = chat_id
                .parse()
                .map_err(|_| DutyrollError::Config(format!("Invalid DUTYROLL_CHAT_ID: {chat_id}")))?;
        }
        if let Some(day) = lookup("DUTYROLL_NOTIFICATION_DAY") {
            self.notification.day = day.parse().map_err(|_| {
                DutyrollError::Config(format!("Invalid DUTYROLL_NOTIFICATION_DAY: {day}"))
            })?;
        }
        if let Some(hour) = lookup("DUTYROLL_NOTIFICATION_HOUR") {
            self.notification.hour = hour.parse().map_err(|_| {
                DutyrollError::Config(format!("Invalid DUTYROLL_NOTIFICATION_HOUR: {hour}"))
            })?;
        }
        self.notification.default_slot()?;
        Ok(())
    }
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String { "~/.dutyroll/dutyroll.db".into() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

impl DatabaseConfig {
    /// Path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Compiled-in weekly reminder slot. Settings stored in the database
/// override these at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// 0 = Monday .. 6 = Sunday.
    #[serde(default = "default_notification_day")]
    pub day: u32,
    #[serde(default = "default_notification_hour")]
    pub hour: u32,
}

fn default_notification_day() -> u32 { 0 }
fn default_notification_hour() -> u32 { 9 }

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            day: default_notification_day(),
            hour: default_notification_hour(),
        }
    }
}

impl NotificationConfig {
    pub fn default_slot(&self) -> Result<TriggerSlot> {
        TriggerSlot::new(self.day, self.hour)
    }
}

/// Telegram Bot API delivery target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    /// Group chat receiving the weekly reminder.
    #[serde(default)]
    pub chat_id: i64,
}

impl TelegramConfig {
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && self.chat_id != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = DutyrollConfig::default();
        assert_eq!(config.notification.day, 0);
        assert_eq!(config.notification.hour, 9);
        assert!(!config.telegram.is_usable());
        assert!(config.database.path.ends_with("dutyroll.db"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [notification]
            day = 4
            hour = 18

            [telegram]
            enabled = true
            bot_token = "123:abc"
            chat_id = -10042
        "#;

        let config: DutyrollConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.notification.default_slot().unwrap(), TriggerSlot::new(4, 18).unwrap());
        assert!(config.telegram.is_usable());
        assert_eq!(config.telegram.chat_id, -10042);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: DutyrollConfig = toml::from_str("").unwrap();
        assert_eq!(config.notification.hour, 9);
        assert!(config.telegram.bot_token.is_empty());
    }

    #[test]
    fn test_load_from_rejects_bad_slot() {
        let dir = std::env::temp_dir().join("dutyroll-config-test");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[notification]\nday = 9\n").unwrap();
        assert!(matches!(
            DutyrollConfig::load_from(&path),
            Err(DutyrollError::InvalidSlot { day: 9, .. })
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DUTYROLL_BOT_TOKEN", "999:xyz"),
            ("DUTYROLL_CHAT_ID", "-5"),
            ("DUTYROLL_NOTIFICATION_HOUR", "20"),
        ]);
        let mut config = DutyrollConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.telegram.bot_token, "999:xyz");
        assert_eq!(config.telegram.chat_id, -5);
        assert!(config.telegram.is_usable());
        assert_eq!(config.notification.hour, 20);
        assert_eq!(config.notification.day, 0);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = DutyrollConfig::default();
        let err = config
            .apply_overrides(|k| (k == "DUTYROLL_NOTIFICATION_DAY").then(|| "monday".to_string()))
            .unwrap_err();
        assert!(matches!(err, DutyrollError::Config(_)));
    }

    #[test]
    fn test_home_dir() {
        let home = DutyrollConfig::home_dir();
        assert!(home.to_string_lossy().contains("dutyroll"));
    }
}
