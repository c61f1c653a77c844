use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SchedulerSettings {
    #[serde(default = "default_timezone")]
    pub timezone: chrono_tz::Tz,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct NotificationSettings {
    /// Whether OS-level notifications are permitted.
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "enabled")]
    pub sound: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SmsSettings {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SmsSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: String,
    /// Upper bound for a single request, connect included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub sms: Option<SmsSettings>,
    #[serde(default)]
    pub remote: Option<RemoteSettings>,
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".meditrack")
}

fn default_timezone() -> chrono_tz::Tz {
    chrono_tz::UTC
}

fn default_timeout_secs() -> u64 {
    10
}

fn enabled() -> bool {
    true
}
