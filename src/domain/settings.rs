use crate::domain::decoder::{DecoderConfig, CLICK_THRESHOLD, POINTER_SPEED};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "gatt_mouse".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_device_address")]
    pub device_address: String,
    #[serde(default = "default_scan_duration_secs")]
    pub scan_duration_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    // Characteristics
    #[serde(default)]
    pub motion_char_uuid: Option<String>,
    #[serde(default = "default_device_name_uuid")]
    pub device_name_char_uuid: Option<String>,
    #[serde(default)]
    pub unknown_char_uuid: Option<String>,
    #[serde(default)]
    pub keep_alive_char_uuid: Option<String>,
    #[serde(default)]
    pub brightness_char_uuid: Option<String>,

    // Pointer control
    #[serde(default = "default_click_threshold")]
    pub click_threshold: u8,
    #[serde(default = "default_pointer_speed")]
    pub pointer_speed: f64,
    #[serde(default = "default_false")]
    pub dry_run: bool,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_address: default_device_address(),
            scan_duration_secs: default_scan_duration_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            motion_char_uuid: None,
            device_name_char_uuid: default_device_name_uuid(),
            unknown_char_uuid: None,
            keep_alive_char_uuid: None,
            brightness_char_uuid: None,
            click_threshold: default_click_threshold(),
            pointer_speed: default_pointer_speed(),
            dry_run: false,
            log_settings: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            click_threshold: self.click_threshold,
            speed: self.pointer_speed,
        }
    }
}

fn default_device_address() -> String {
    "FD:D3:9D:E7:40:E0".to_string()
}
fn default_scan_duration_secs() -> u64 {
    5
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_device_name_uuid() -> Option<String> {
    // GAP Device Name
    Some("00002a00-0000-1000-8000-00805f9b34fb".to_string())
}
fn default_click_threshold() -> u8 {
    CLICK_THRESHOLD
}
fn default_pointer_speed() -> f64 {
    POINTER_SPEED
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load(settings_path))
    }

    /// Load from `settings_path`, falling back to defaults if it is missing or invalid
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!("Using default settings ({:#})", e);
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("gatt_mouse");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    #[cfg(test)]
    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn set_device_address(&mut self, address: String) -> anyhow::Result<()> {
        self.settings.device_address = address;
        self.save()
    }
}
