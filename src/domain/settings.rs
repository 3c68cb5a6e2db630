use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    // Console logs go to stderr; stdout carries the operator status lines
    #[serde(default = "default_false")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
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
            file_logging_enabled: default_true(),
            console_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

/// How the control agent process is launched and read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Upper bound on waiting for the first line of a burst
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Quiet period that ends a burst once output has started
    #[serde(default = "default_burst_settle_ms")]
    pub burst_settle_ms: u64,
    /// Hard limit on collecting one burst, so a chatty agent cannot stall a read
    #[serde(default = "default_max_burst_ms")]
    pub max_burst_ms: u64,
    #[serde(default = "default_exit_grace_ms")]
    pub exit_grace_ms: u64,
}

impl AgentSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn burst_settle(&self) -> Duration {
        Duration::from_millis(self.burst_settle_ms)
    }

    pub fn max_burst(&self) -> Duration {
        Duration::from_millis(self.max_burst_ms)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_ms)
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            read_timeout_ms: default_read_timeout_ms(),
            burst_settle_ms: default_burst_settle_ms(),
            max_burst_ms: default_max_burst_ms(),
            exit_grace_ms: default_exit_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotSettings {
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_write_char_uuid")]
    pub write_char_uuid: String,
    /// `None` waits for the robot forever
    #[serde(default)]
    pub discovery_timeout_secs: Option<u64>,
    #[serde(default)]
    pub resolve_timeout_secs: Option<u64>,
}

impl Default for RobotSettings {
    fn default() -> Self {
        Self {
            service_uuid: default_service_uuid(),
            write_char_uuid: default_write_char_uuid(),
            discovery_timeout_secs: None,
            resolve_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub robot: RobotSettings,
    #[serde(default)]
    pub log_settings: LogSettings,
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
    dirs::data_local_dir()
        .map(|p| p.join("ble-robot-drive").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
        .to_string_lossy()
        .into_owned()
}
fn default_prefix() -> String {
    "ble_robot_drive".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_program() -> String {
    "bluetoothctl".to_string()
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_burst_settle_ms() -> u64 {
    50
}
fn default_max_burst_ms() -> u64 {
    500
}
fn default_exit_grace_ms() -> u64 {
    2000
}
// Nordic UART service and its RX (write) characteristic
fn default_service_uuid() -> String {
    "6e400001-b5a3-f393-e0a9-e50e24dcca9e".to_string()
}
fn default_write_char_uuid() -> String {
    "6e400002-b5a3-f393-e0a9-e50e24dcca9e".to_string()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
    // Loading runs before logging is up, so problems are kept for the caller
    problems: Vec<String>,
}

impl SettingsService {
    /// Load settings from the user config directory, writing a default file on first run
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load(settings_path))
    }

    fn load(settings_path: PathBuf) -> Self {
        let mut problems = Vec::new();

        if !settings_path.exists() {
            let service = Self {
                settings: Settings::default(),
                settings_path,
                problems,
            };
            if let Err(e) = service.save() {
                let problem = format!(
                    "Could not write default settings to {}: {}",
                    service.settings_path.display(),
                    e
                );
                return Self {
                    problems: vec![problem],
                    ..service
                };
            }
            return service;
        }

        let settings = Self::load_from_file(&settings_path).unwrap_or_else(|e| {
            problems.push(format!(
                "Ignoring unreadable settings file {}: {}",
                settings_path.display(),
                e
            ));
            Settings::default()
        });

        Self {
            settings,
            settings_path,
            problems,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("ble-robot-drive");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    /// Problems hit while loading; defaults were used in their place
    pub fn problems(&self) -> &[String] {
        &self.problems
    }
}
