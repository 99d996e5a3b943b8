use tracing::{info, info_span, Instrument};

use crate::embedded::configuration::LayoutConfig;
use crate::embedded::platform::{create_hardware_factory, PlatformProbe};
use crate::error::{AppError, FactoryError};
use crate::schedule::{
    FileWateringConfigProvider, SchedulerOptions, Settings, StaticWateringConfigProvider, WateringConfigProvider,
    WateringScheduler,
};

pub struct App {
    settings: Settings,
}

impl App {
    pub fn new(settings: Settings) -> App {
        App { settings }
    }

    pub fn build_scheduler(&self, probe: &dyn PlatformProbe) -> Result<WateringScheduler, FactoryError> {
        let factory = create_hardware_factory(self.settings.hardware_mode, probe, self.settings.simulation_seed)?;
        let provider: Box<dyn WateringConfigProvider> = match &self.settings.watering_config_path {
            Some(path) => {
                info!(path = %path, "Reading watering config from file");
                Box::new(FileWateringConfigProvider::new(path))
            }
            None => {
                info!("Using built-in watering config");
                Box::new(StaticWateringConfigProvider::default())
            }
        };
        Ok(WateringScheduler::new(
            factory,
            provider,
            LayoutConfig::default(),
            SchedulerOptions::from(&self.settings),
        ))
    }

    /// Runs until SIGINT/SIGTERM. Fails fast if no usable hardware backend exists.
    pub async fn run(&self, probe: &dyn PlatformProbe) -> Result<(), AppError> {
        let span = match &self.settings.device {
            Some(device) => info_span!("device", id = %device.id, name = %device.name),
            None => info_span!("device"),
        };
        let mut scheduler = span.in_scope(|| self.build_scheduler(probe))?;
        scheduler.start().instrument(span).await?;
        Ok(())
    }
}
