//! Error types shared across the hardware, schedule and settings layers.
//!
//! Each failure domain gets its own enum so callers can tell a per-plant
//! transport fault (recovered inside the cycle) from a fetch or construction
//! failure (handled by the loop) or a factory selection failure (fatal).

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("Sensor error on channel {channel}: {message}")]
    Sensor { channel: u8, message: String },

    #[error("Pump error on GPIO {pin}: {message}")]
    Pump { pin: u8, message: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("Real hardware backend is not implemented")]
    RealHardwareUnimplemented,

    #[error("Real hardware requested but platform is not a supported target ({0})")]
    NotTargetPlatform(String),
}

#[derive(Error, Debug)]
pub enum ConfigFetchError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Could not read watering config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse watering config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid watering config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Configuration error: {plants} plants configured but only {slots} hardware slots available")]
    TooManyPlants { plants: usize, slots: usize },

    #[error("Configuration fetch failed: {0}")]
    Fetch(#[from] ConfigFetchError),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Hardware setup failed: {0}")]
    Setup(#[from] HardwareError),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Could not open log file {path}: {source}")]
    LogFile {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
