//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "sledovanitv_pvr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ServiceProvider {
    #[default]
    SledovaniTv,
    ModerniTv,
}

impl ServiceProvider {
    pub fn api_url(&self) -> &'static str {
        match self {
            ServiceProvider::SledovaniTv => "https://sledovanitv.cz/api/",
            ServiceProvider::ModerniTv => "https://api.moderntv.eu/api/",
        }
    }

    /// Value of the `unit` parameter on pairing/login calls
    pub fn unit(&self) -> &'static str {
        match self {
            ServiceProvider::SledovaniTv => "default",
            ServiceProvider::ModerniTv => "modernitv",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceProvider::SledovaniTv => "sledovanitv.cz",
            ServiceProvider::ModerniTv => "moderntv.eu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StreamQuality {
    #[default]
    Default,
    Sd,
    Hd,
}

impl StreamQuality {
    /// Numeric value understood by the `playlist` call
    pub fn api_value(&self) -> u32 {
        match self {
            StreamQuality::Default => 0,
            StreamQuality::Sd => 20,
            StreamQuality::Hd => 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonConfig {
    #[serde(default)]
    pub service_provider: ServiceProvider,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
    /// Overrides the MAC address used to derive the device serial
    #[serde(default)]
    pub device_id: String,
    /// Overrides the host name sent as the pairing product
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub stream_quality: StreamQuality,
    // Refresh intervals
    #[serde(default = "default_full_refresh_hours")]
    pub full_channel_epg_refresh_hours: u64,
    #[serde(default = "default_loadings_refresh")]
    pub loadings_refresh_secs: u64,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_delay_secs: u64,
    #[serde(default = "default_epg_check")]
    pub epg_check_delay_mins: u64,
    #[serde(default = "default_login_retry")]
    pub login_retry_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    // Stream capabilities
    #[serde(default)]
    pub use_h265: bool,
    #[serde(default)]
    pub use_adaptive: bool,
    // Locked channels
    #[serde(default = "default_true")]
    pub show_locked_channels: bool,
    #[serde(default = "default_true")]
    pub show_locked_only_pin: bool,
    // EPG window
    #[serde(default = "default_future_days")]
    pub epg_max_future_days: u32,
    #[serde(default = "default_past_days")]
    pub epg_max_past_days: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_full_refresh_hours() -> u64 { 24 }
fn default_loadings_refresh() -> u64 { 60 }
fn default_keep_alive() -> u64 { 20 }
fn default_epg_check() -> u64 { 1 }
fn default_login_retry() -> u64 { 30 }
fn default_poll_interval() -> u64 { 1000 }
fn default_true() -> bool { true }
fn default_future_days() -> u32 { 3 }
fn default_past_days() -> u32 { 1 }
fn default_user_agent() -> String { "okhttp/3.12.0".to_string() }

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            service_provider: ServiceProvider::SledovaniTv,
            user_name: String::new(),
            password: String::new(),
            device_id: String::new(),
            product_id: String::new(),
            stream_quality: StreamQuality::Default,
            full_channel_epg_refresh_hours: 24,
            loadings_refresh_secs: 60,
            keep_alive_delay_secs: 20,
            epg_check_delay_mins: 1,
            login_retry_secs: 30,
            poll_interval_ms: 1000,
            use_h265: false,
            use_adaptive: false,
            show_locked_channels: true,
            show_locked_only_pin: true,
            epg_max_future_days: 3,
            epg_max_past_days: 1,
            user_agent: default_user_agent(),
        }
    }
}

impl AddonConfig {
    pub fn full_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.full_channel_epg_refresh_hours * 3600)
    }

    pub fn recordings_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.loadings_refresh_secs)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_delay_secs)
    }

    pub fn epg_check_interval(&self) -> Duration {
        Duration::from_secs(self.epg_check_delay_mins * 60)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Number of poll ticks between two login attempts
    pub fn login_retry_ticks(&self) -> u64 {
        let retry_ms = self.login_retry_secs * 1000;
        (retry_ms / self.poll_interval_ms.max(1)).max(1)
    }

    /// Whether a channel with the given `locked` reason is presented
    pub fn shows_locked(&self, locked: &str) -> bool {
        if locked == "none" {
            return true;
        }
        self.show_locked_channels && (!self.show_locked_only_pin || locked == "pin")
    }

    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        fs::create_dir_all(&path).ok();
        path.push("config.json");
        path
    }

    pub fn load() -> Self {
        let path = Self::config_path();

        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Ignoring malformed config {}: {}", path.display(), e),
                },
                Err(e) => log::warn!("Cannot read config {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    pub fn save(&self) {
        let path = Self::config_path();
        if let Ok(content) = serde_json::to_string_pretty(self) {
            if let Err(e) = fs::write(&path, content) {
                log::warn!("Cannot write config {}: {}", path.display(), e);
            }
        }
    }
}

/// Per-user data directory holding the pairing file
pub fn user_data_dir() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    fs::create_dir_all(&path).ok();
    path
}
