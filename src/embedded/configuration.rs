use serde::{Deserialize, Serialize};

/// Physical wiring of the watering positions. Compiled in, not user editable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LayoutConfig {
    slots: Vec<SlotConfig>,
}

impl LayoutConfig {
    pub fn new(slots: Vec<SlotConfig>) -> Self {
        LayoutConfig { slots }
    }
    pub fn get_slots(&self) -> &[SlotConfig] {
        &self.slots
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            slots: vec![
                SlotConfig::new(0, 17),
                SlotConfig::new(1, 27),
            ],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct SlotConfig {
    sensor_channel: u8,
    pump_pin: u8,
}

impl SlotConfig {
    pub fn new(sensor_channel: u8, pump_pin: u8) -> Self {
        SlotConfig {
            sensor_channel,
            pump_pin,
        }
    }
    pub fn get_sensor_channel(&self) -> u8 {
        self.sensor_channel
    }
    pub fn get_pump_pin(&self) -> u8 {
        self.pump_pin
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HardwareMode {
    Mock,
    #[default]
    Detect,
    Real,
}
