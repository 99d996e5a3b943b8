use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::embedded::configuration::HardwareMode;
use crate::error::SettingsError;

pub const DEFAULT_SETTINGS_PATH: &str = "drip-butler.json";
pub const ENV_PREFIX: &str = "DRIP";

/// Process-wide settings, read once at startup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Validated when the loop starts; invalid values fall back to the default.
    pub check_interval_ms: Option<f64>,
    pub hardware_mode: HardwareMode,
    /// Watering config JSON file. The built-in plant defaults are used when unset.
    pub watering_config_path: Option<String>,
    pub sensor_timeout_ms: u64,
    pub pump_timeout_grace_ms: u64,
    pub simulation_seed: Option<u64>,
    pub device: Option<DeviceSettings>,
    pub logging: Vec<LogSink>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            check_interval_ms: None,
            hardware_mode: HardwareMode::default(),
            watering_config_path: None,
            sensor_timeout_ms: 10_000,
            pump_timeout_grace_ms: 5_000,
            simulation_seed: None,
            device: None,
            logging: vec![LogSink::Console {
                level: LogLevel::Info,
            }],
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Settings, SettingsError> {
        Settings::load_with_prefix(path, ENV_PREFIX)
    }

    pub fn load_with_prefix<P: AsRef<Path>>(path: P, env_prefix: &str) -> Result<Settings, SettingsError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Json).required(false))
            .add_source(config::Environment::with_prefix(env_prefix).try_parsing(true))
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "dest", rename_all = "lowercase")]
pub enum LogSink {
    Console {
        #[serde(default)]
        level: LogLevel,
    },
    File {
        #[serde(default)]
        level: LogLevel,
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::load_with_prefix("/nonexistent/drip-butler.json", "DRIPTEST_MISSING").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "check_interval_ms": 2500,
                "hardware_mode": "mock",
                "watering_config_path": "/etc/drip/plants.json",
                "simulation_seed": 17,
                "device": { "id": "dev-1", "name": "Balcony" },
                "logging": [
                    { "dest": "console", "level": "debug" },
                    { "dest": "file", "path": "/var/log/drip.log" }
                ]
            }"#,
        )
        .unwrap();

        let settings = Settings::load_with_prefix(&path, "DRIPTEST_FILE").unwrap();

        assert_eq!(settings.check_interval_ms, Some(2500.0));
        assert_eq!(settings.hardware_mode, HardwareMode::Mock);
        assert_eq!(settings.watering_config_path.as_deref(), Some("/etc/drip/plants.json"));
        assert_eq!(settings.simulation_seed, Some(17));
        assert_eq!(settings.sensor_timeout_ms, 10_000);
        assert_eq!(
            settings.device,
            Some(DeviceSettings {
                id: "dev-1".to_string(),
                name: "Balcony".to_string(),
            })
        );
        assert_eq!(
            settings.logging,
            vec![
                LogSink::Console { level: LogLevel::Debug },
                LogSink::File {
                    level: LogLevel::Info,
                    path: "/var/log/drip.log".to_string(),
                },
            ]
        );
    }

    #[test]
    fn environment_overrides_file() {
        std::env::set_var("DRIPTEST_ENV_CHECK_INTERVAL_MS", "750");
        std::env::set_var("DRIPTEST_ENV_HARDWARE_MODE", "mock");
        let settings = Settings::load_with_prefix("/nonexistent/drip-butler.json", "DRIPTEST_ENV").unwrap();
        assert_eq!(settings.check_interval_ms, Some(750.0));
        assert_eq!(settings.hardware_mode, HardwareMode::Mock);
    }
}
