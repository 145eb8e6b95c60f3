//! TOML-based timer configuration.
//!
//! Stores the tunables the exam timer exposes:
//! - warning thresholds and messages
//! - expiry grace delay
//! - persistence cadence and snapshot staleness limit
//! - display formatting
//!
//! Configuration is stored at `~/.config/primepath/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::display::ColorClass;
use crate::error::ConfigError;
use crate::storage::data_dir;

/// One warning rule: announced once per countdown when remaining time
/// first reaches the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRule {
    pub threshold_secs: u64,
    pub message: String,
    pub severity: ColorClass,
}

impl WarningRule {
    pub fn new(threshold_secs: u64, message: impl Into<String>, severity: ColorClass) -> Self {
        Self {
            threshold_secs,
            message: message.into(),
            severity,
        }
    }
}

/// Timer configuration.
///
/// Serialized to/from TOML at `~/.config/primepath/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Delay between starting an already-expired timer and firing its
    /// expiry callback. Gives the UI a moment to show the "time expired"
    /// indication before auto-submission.
    #[serde(default = "default_grace_delay")]
    pub grace_delay_secs: u64,
    /// Persist the snapshot every Nth tick while running.
    #[serde(default = "default_persist_cadence")]
    pub persist_every_ticks: u32,
    /// Persisted snapshots older than this are discarded on restore.
    #[serde(default = "default_max_age_hours")]
    pub max_snapshot_age_hours: u64,
    /// Always format as `H:MM:SS` even under one hour.
    #[serde(default)]
    pub show_hours: bool,
    /// Disable to run without any snapshot writes.
    #[serde(default = "default_true")]
    pub persistence_enabled: bool,
    /// Warning rules, checked in list order on every tick.
    #[serde(default = "default_warnings")]
    pub warnings: Vec<WarningRule>,
}

fn default_grace_delay() -> u64 {
    2
}
fn default_persist_cadence() -> u32 {
    5
}
fn default_max_age_hours() -> u64 {
    24
}
fn default_true() -> bool {
    true
}
fn default_warnings() -> Vec<WarningRule> {
    vec![
        WarningRule::new(300, "5 minutes remaining", ColorClass::Notice),
        WarningRule::new(60, "1 minute remaining", ColorClass::Warning),
        WarningRule::new(30, "30 seconds remaining", ColorClass::Critical),
    ]
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            grace_delay_secs: default_grace_delay(),
            persist_every_ticks: default_persist_cadence(),
            max_snapshot_age_hours: default_max_age_hours(),
            show_hours: false,
            persistence_enabled: true,
            warnings: default_warnings(),
        }
    }
}

impl TimerConfig {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/primepath"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
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
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persist_every_ticks == 0 {
            return Err(ConfigError::InvalidValue {
                key: "persist_every_ticks".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.max_snapshot_age_hours == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_snapshot_age_hours".into(),
                message: "must be at least 1".into(),
            });
        }
        for rule in &self.warnings {
            if rule.threshold_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "warnings".into(),
                    message: "threshold_secs must be greater than 0".into(),
                });
            }
        }
        for pair in self.warnings.windows(2) {
            if pair[0].threshold_secs <= pair[1].threshold_secs {
                return Err(ConfigError::InvalidValue {
                    key: "warnings".into(),
                    message: "thresholds must be strictly decreasing".into(),
                });
            }
        }
        Ok(())
    }

    pub fn max_snapshot_age_ms(&self) -> u64 {
        self.max_snapshot_age_hours
            .saturating_mul(60 * 60)
            .saturating_mul(1000)
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        match current {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a scalar config value by key and persist. The new value must
    /// parse as the same JSON type the key currently holds.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;

        let mut parts: Vec<&str> = key.split('.').collect();
        let leaf = parts.pop().filter(|p| !p.is_empty()).ok_or_else(|| {
            invalid("config key is empty".into())
        })?;
        let mut current = &mut json;
        for part in parts {
            current = current
                .get_mut(part)
                .ok_or_else(|| invalid("unknown config key".into()))?;
        }
        let obj = current
            .as_object_mut()
            .ok_or_else(|| invalid("unknown config key".into()))?;
        let existing = obj
            .get(leaf)
            .ok_or_else(|| invalid("unknown config key".into()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => serde_json::Value::Number(
                value
                    .parse::<u64>()
                    .map_err(|e| invalid(e.to_string()))?
                    .into(),
            ),
            serde_json::Value::String(_) => serde_json::Value::String(value.to_string()),
            _ => serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?,
        };
        obj.insert(leaf.to_string(), new_value);

        let updated: TimerConfig =
            serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = TimerConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TimerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.grace_delay_secs, 2);
        assert_eq!(parsed.persist_every_ticks, 5);
        assert_eq!(parsed.max_snapshot_age_hours, 24);
        assert_eq!(parsed.warnings.len(), 3);
    }

    #[test]
    fn default_warning_thresholds() {
        let cfg = TimerConfig::default();
        let thresholds: Vec<u64> = cfg.warnings.iter().map(|w| w.threshold_secs).collect();
        assert_eq!(thresholds, vec![300, 60, 30]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_cadence() {
        let cfg = TimerConfig {
            persist_every_ticks: 0,
            ..TimerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_unordered_thresholds() {
        let mut cfg = TimerConfig::default();
        cfg.warnings.reverse();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_threshold() {
        let mut cfg = TimerConfig::default();
        cfg.warnings
            .push(WarningRule::new(0, "now", ColorClass::Critical));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = TimerConfig::default();
        assert_eq!(cfg.get("grace_delay_secs").as_deref(), Some("2"));
        assert_eq!(cfg.get("show_hours").as_deref(), Some("false"));
        assert!(cfg.get("missing_key").is_none());
    }

    #[test]
    fn max_age_in_millis() {
        let cfg = TimerConfig::default();
        assert_eq!(cfg.max_snapshot_age_ms(), 24 * 60 * 60 * 1000);
    }
}
