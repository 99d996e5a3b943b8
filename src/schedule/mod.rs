pub use self::configuration::{
    FileWateringConfigProvider, PlantProfile, StaticWateringConfigProvider, WateringConfig,
    WateringConfigProvider,
};
pub use self::decision::{decide, WateringDecision};
pub use self::settings::Settings;
pub use self::watering::{HardwareSlot, LoopState, PlantRuntime, SchedulerOptions, WateringScheduler};

pub mod configuration;
pub mod decision;
pub mod settings;
pub mod watering;
