//! Application-level configuration: the JSON file holding game defaults and
//! runtime tuning, plus the storage backend selection read from the environment.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::{Settings, SettingsUpdate};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "POT_SHARE_CONFIG_PATH";
/// Environment variable selecting the persistence backend.
const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 64;
const DEFAULT_SSE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    default_settings: Settings,
    transition_timeout: Option<Duration>,
    command_queue_capacity: usize,
    sse_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        num_teams = config.default_settings.num_teams,
                        initial_points = config.default_settings.initial_points,
                        multiplier = config.default_settings.multiplier,
                        "loaded game defaults from config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document. Absent keys keep their built-in value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Settings used at startup and restored by a full reset.
    pub fn default_settings(&self) -> Settings {
        self.default_settings
    }

    /// Upper bound on a single persistence round-trip; `None` waits forever.
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.transition_timeout
    }

    /// Capacity of the engine command queue.
    pub fn command_queue_capacity(&self) -> usize {
        self.command_queue_capacity
    }

    /// Capacity of each SSE broadcast channel.
    pub fn sse_capacity(&self) -> usize {
        self.sse_capacity
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_settings: Settings::default(),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            sse_capacity: DEFAULT_SSE_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    default_settings: RawSettings,
    /// `0` disables the timeout.
    transition_timeout_ms: Option<u64>,
    command_queue_capacity: Option<usize>,
    sse_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    num_teams: Option<u32>,
    initial_points: Option<f64>,
    multiplier: Option<f64>,
    hide_points: Option<bool>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let fallback = Self::default();

        let mut settings = Settings::default();
        SettingsUpdate {
            num_teams: value.default_settings.num_teams.filter(|n| *n >= 1),
            initial_points: value
                .default_settings
                .initial_points
                .filter(|p| p.is_finite() && *p >= 0.0),
            multiplier: value
                .default_settings
                .multiplier
                .filter(|m| m.is_finite() && *m >= 0.0),
            hide_points: value.default_settings.hide_points,
        }
        .apply(&mut settings);

        let transition_timeout = match value.transition_timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => fallback.transition_timeout,
        };

        Self {
            default_settings: settings,
            transition_timeout,
            command_queue_capacity: value
                .command_queue_capacity
                .filter(|c| *c > 0)
                .unwrap_or(fallback.command_queue_capacity),
            sse_capacity: value
                .sse_capacity
                .filter(|c| *c > 0)
                .unwrap_or(fallback.sse_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Persistence backend chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local store, nothing survives a restart.
    Memory,
    /// MongoDB through the official driver.
    Mongo,
    /// CouchDB over its HTTP API.
    Couch,
}

impl StorageBackend {
    /// Read [`STORAGE_BACKEND_ENV`]; unset or unknown values select memory.
    pub fn from_env() -> Self {
        match env::var(STORAGE_BACKEND_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                warn!(value = %value, "unknown storage backend; using in-memory store");
                Self::Memory
            }),
            Err(_) => Self::Memory,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Some(Self::Memory),
            "mongo" | "mongodb" => Some(Self::Mongo),
            "couch" | "couchdb" => Some(Self::Couch),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.default_settings(), Settings::default());
        assert_eq!(config.transition_timeout(), Some(DEFAULT_TRANSITION_TIMEOUT));
        assert_eq!(config.command_queue_capacity(), DEFAULT_COMMAND_QUEUE_CAPACITY);
    }

    #[test]
    fn partial_settings_override_defaults() {
        let config = AppConfig::from_json(
            r#"{ "default_settings": { "num_teams": 4, "multiplier": 1.5 }, "transition_timeout_ms": 0 }"#,
        )
        .unwrap();
        let settings = config.default_settings();
        assert_eq!(settings.num_teams, 4);
        assert_eq!(settings.multiplier, 1.5);
        assert_eq!(settings.initial_points, 20.0);
        assert_eq!(config.transition_timeout(), None);
    }

    #[test]
    fn out_of_range_values_are_ignored() {
        let config = AppConfig::from_json(
            r#"{ "default_settings": { "num_teams": 0, "initial_points": -3 }, "sse_capacity": 0 }"#,
        )
        .unwrap();
        assert_eq!(config.default_settings(), Settings::default());
        assert_eq!(config.sse_capacity(), DEFAULT_SSE_CAPACITY);
    }

    #[test]
    fn backend_names_are_case_insensitive() {
        assert_eq!(StorageBackend::parse("Mongo"), Some(StorageBackend::Mongo));
        assert_eq!(StorageBackend::parse("couchdb"), Some(StorageBackend::Couch));
        assert_eq!(StorageBackend::parse(""), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::parse("redis"), None);
    }
}
