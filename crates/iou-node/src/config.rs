//! Node configuration loading and management.

use iou_settlement::SettlementConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Full configuration for the IOU node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IouConfig {
    /// HTTP API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Debt storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Background scan settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Settlement and side-effect retry settings.
    #[serde(default)]
    pub settlement: SettlementConfig,

    /// Real-time fan-out settings.
    #[serde(default)]
    pub events: EventsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where debts are kept.
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Path to the data directory (rocksdb backend only).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between overdue scans.
    #[serde(default = "default_daily")]
    pub overdue_interval_secs: u64,
    /// Seconds between reminder scans.
    #[serde(default = "default_daily")]
    pub reminder_interval_secs: u64,
    /// Run both scans once right after start.
    #[serde(default)]
    pub run_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Events buffered per room before slow subscribers lag.
    #[serde(default = "default_room_capacity")]
    pub room_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    8080
}
fn default_backend() -> StorageBackend {
    StorageBackend::Memory
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_daily() -> u64 {
    86_400
}
fn default_room_capacity() -> usize {
    iou_events::bus::DEFAULT_ROOM_CAPACITY
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            overdue_interval_secs: default_daily(),
            reminder_interval_secs: default_daily(),
            run_on_startup: false,
        }
    }
}

impl SchedulerConfig {
    pub fn overdue_interval(&self) -> Duration {
        Duration::from_secs(self.overdue_interval_secs)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            room_capacity: default_room_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl IouConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: IouConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `listen_addr:port` of the HTTP API.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }
}
