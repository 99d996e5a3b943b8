use std::time::Duration;

use async_trait::async_trait;

use crate::error::HardwareError;

pub mod configuration;
pub mod fake;
pub mod platform;

/// A single moisture observation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MoistureReading {
    /// 0 = completely dry, 100 = completely wet. Two decimal places.
    pub percent: f64,
    /// Sensor-native value, 0..=32767.
    pub raw: u16,
}

impl MoistureReading {
    pub const RAW_MAX: f64 = 32767.0;

    pub fn from_percent(percent: f64) -> MoistureReading {
        let percent = round_two_decimals(percent.clamp(0.0, 100.0));
        let raw = (percent / 100.0 * Self::RAW_MAX).round() as u16;
        MoistureReading { percent, raw }
    }
}

#[async_trait]
pub trait MoistureSensor: Send + Sync {
    async fn read(&self) -> Result<MoistureReading, HardwareError>;
    fn get_channel(&self) -> u8;
}

/// A relay-driven water pump.
///
/// `activate` runs the pump for roughly `duration` and clears the active
/// flag itself. Activating an already active pump is a logged no-op.
#[async_trait]
pub trait Pump: Send + Sync {
    async fn activate(&self, duration: Duration) -> Result<(), HardwareError>;
    async fn deactivate(&self) -> Result<(), HardwareError>;
    fn is_active(&self) -> bool;
    fn get_pin(&self) -> u8;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PumpOptions {
    pub gpio_pin: u8,
    /// Sensor channel watching the plant this pump waters.
    pub sensor_channel: Option<u8>,
}

#[async_trait]
pub trait HardwareFactory: Send + Sync {
    fn create_sensor(&self, channel: u8) -> Result<Box<dyn MoistureSensor>, HardwareError>;
    fn create_pump(&self, options: PumpOptions) -> Result<Box<dyn Pump>, HardwareError>;
    async fn cleanup(&self) -> Result<(), HardwareError>;
}

pub(crate) fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_raw_follows_percent() {
        let reading = MoistureReading::from_percent(50.0);
        assert_eq!(reading.raw, 16384);
        assert_eq!(MoistureReading::from_percent(0.0).raw, 0);
        assert_eq!(MoistureReading::from_percent(100.0).raw, 32767);
    }

    #[test]
    fn reading_is_clamped_and_rounded() {
        assert_eq!(MoistureReading::from_percent(-3.0).percent, 0.0);
        assert_eq!(MoistureReading::from_percent(140.0).percent, 100.0);
        assert_eq!(MoistureReading::from_percent(33.3333).percent, 33.33);
    }
}
