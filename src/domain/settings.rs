use crate::domain::session::{ArmPolicy, SessionConfig, LOOPBACK_DELAY_MS, RSSI_POLL_INTERVAL_MS};
use crate::infrastructure::link::codec::{DecodeMode, FrameCodec};
use crate::infrastructure::link::error::ProtocolError;
use crate::infrastructure::link::protocol::{
    DEFAULT_DELIMITER, DEFAULT_SEPARATOR, DEFAULT_VALIDATION_CODE,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

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
    "info".to_string()
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
    "launch_control".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Serial link and protocol behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_separator")]
    pub separator: char,
    /// Echo outbound frames back into the session (headless testing)
    #[serde(default = "default_false")]
    pub loopback: bool,
    #[serde(default = "default_loopback_delay_ms")]
    pub loopback_delay_ms: u64,
    #[serde(default = "default_rssi_poll_interval_ms")]
    pub rssi_poll_interval_ms: u64,
    #[serde(default)]
    pub arm_policy: ArmPolicy,
    #[serde(default)]
    pub decode_mode: DecodeMode,
    /// host:port of a TCP serial bridge
    #[serde(default)]
    pub bridge_address: Option<String>,
    #[serde(default = "default_connect_retries")]
    pub max_connect_retries: u32,
    #[serde(default = "default_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            separator: default_separator(),
            loopback: false,
            loopback_delay_ms: default_loopback_delay_ms(),
            rssi_poll_interval_ms: default_rssi_poll_interval_ms(),
            arm_policy: ArmPolicy::default(),
            decode_mode: DecodeMode::default(),
            bridge_address: None,
            max_connect_retries: default_connect_retries(),
            connect_retry_delay_ms: default_connect_retry_delay_ms(),
        }
    }
}

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}
fn default_separator() -> char {
    DEFAULT_SEPARATOR
}
fn default_loopback_delay_ms() -> u64 {
    LOOPBACK_DELAY_MS
}
fn default_rssi_poll_interval_ms() -> u64 {
    RSSI_POLL_INTERVAL_MS
}
fn default_connect_retries() -> u32 {
    3
}
fn default_connect_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_validation_code")]
    pub validation_code: String,
    #[serde(default = "default_true")]
    pub auto_record: bool,
    #[serde(default = "default_true")]
    pub auto_countdown: bool,
    #[serde(default = "default_countdown_from")]
    pub countdown_from: u32,
    #[serde(default = "default_countdown_period_ms")]
    pub countdown_period_ms: u64,

    #[serde(default)]
    pub link: LinkSettings,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            validation_code: default_validation_code(),
            auto_record: true,
            auto_countdown: true,
            countdown_from: default_countdown_from(),
            countdown_period_ms: default_countdown_period_ms(),
            link: LinkSettings::default(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_validation_code() -> String {
    DEFAULT_VALIDATION_CODE.to_string()
}
fn default_countdown_from() -> u32 {
    5
}
fn default_countdown_period_ms() -> u64 {
    1000
}

impl Settings {
    /// Build the session configuration these settings describe
    pub fn session_config(&self) -> Result<SessionConfig, ProtocolError> {
        Ok(SessionConfig {
            validation_code: self.validation_code.clone(),
            codec: FrameCodec::new(self.link.delimiter, self.link.separator)?,
            decode_mode: self.link.decode_mode,
            loopback: self.link.loopback,
            loopback_delay: Duration::from_millis(self.link.loopback_delay_ms),
            rssi_poll_interval: Duration::from_millis(self.link.rssi_poll_interval_ms),
            arm_policy: self.link.arm_policy,
        })
    }

    pub fn countdown_period(&self) -> Duration {
        Duration::from_millis(self.countdown_period_ms)
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load settings from an explicit file, falling back to defaults
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!("Using default settings ({}): {}", settings_path.display(), e);
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
        path.push("LaunchControl");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.settings_path.parent() {
            fs::create_dir_all(dir)?;
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

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn update_validation_code(&mut self, code: &str) -> anyhow::Result<()> {
        if self.settings.validation_code != code {
            self.settings.validation_code = code.to_string();
            self.save()?;
        }
        Ok(())
    }
}
