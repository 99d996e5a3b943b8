use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigFetchError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlantProfile {
    pub id: String,
    pub name: String,
    /// Watering triggers strictly below this moisture percentage.
    pub threshold_percent: f64,
    pub watering_duration_ms: u64,
    pub min_interval_ms: u64,
}

impl PlantProfile {
    pub fn get_watering_duration(&self) -> Duration {
        Duration::from_millis(self.watering_duration_ms)
    }
    pub fn get_min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WateringConfig {
    pub plants: Vec<PlantProfile>,
    #[serde(default = "enabled_by_default")]
    pub auto_watering_enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl WateringConfig {
    pub fn new(plants: Vec<PlantProfile>) -> Self {
        WateringConfig {
            plants,
            auto_watering_enabled: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigFetchError> {
        let mut ids = HashSet::new();
        for plant in &self.plants {
            if plant.id.is_empty() {
                return Err(ConfigFetchError::Invalid("plant id must not be empty".to_string()));
            }
            if !ids.insert(plant.id.as_str()) {
                return Err(ConfigFetchError::Invalid(format!("duplicate plant id {}", plant.id)));
            }
            if !plant.threshold_percent.is_finite() || !(0.0..=100.0).contains(&plant.threshold_percent) {
                return Err(ConfigFetchError::Invalid(format!(
                    "plant {} threshold {} is outside 0-100",
                    plant.id, plant.threshold_percent
                )));
            }
        }
        Ok(())
    }
}

impl Default for WateringConfig {
    fn default() -> Self {
        WateringConfig::new(vec![
            PlantProfile {
                id: "plant-1".to_string(),
                name: "Plant 1".to_string(),
                threshold_percent: 35.0,
                watering_duration_ms: 1_500,
                min_interval_ms: 30_000,
            },
            PlantProfile {
                id: "plant-2".to_string(),
                name: "Plant 2".to_string(),
                threshold_percent: 35.0,
                watering_duration_ms: 1_500,
                min_interval_ms: 30_000,
            },
        ])
    }
}

/// Source of the plant profiles, asked once per cycle.
#[async_trait]
pub trait WateringConfigProvider: Send + Sync {
    async fn load(&self) -> Result<WateringConfig, ConfigFetchError>;
}

/// Always hands out the same configuration.
pub struct StaticWateringConfigProvider {
    config: WateringConfig,
}

impl StaticWateringConfigProvider {
    pub fn new(config: WateringConfig) -> Self {
        StaticWateringConfigProvider { config }
    }
}

impl Default for StaticWateringConfigProvider {
    fn default() -> Self {
        StaticWateringConfigProvider::new(WateringConfig::default())
    }
}

#[async_trait]
impl WateringConfigProvider for StaticWateringConfigProvider {
    async fn load(&self) -> Result<WateringConfig, ConfigFetchError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}

/// Reads a JSON file on every load, so edits apply on the next cycle.
pub struct FileWateringConfigProvider {
    path: PathBuf,
}

impl FileWateringConfigProvider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileWateringConfigProvider { path: path.into() }
    }
}

#[async_trait]
impl WateringConfigProvider for FileWateringConfigProvider {
    async fn load(&self) -> Result<WateringConfig, ConfigFetchError> {
        let data = tokio::fs::read(&self.path).await?;
        let config: WateringConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        debug!(path = %self.path.display(), plants = config.plants.len(), "Loaded watering config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn profile(id: &str, threshold_percent: f64) -> PlantProfile {
        PlantProfile {
            id: id.to_string(),
            name: id.to_uppercase(),
            threshold_percent,
            watering_duration_ms: 1000,
            min_interval_ms: 1000,
        }
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = WateringConfig::new(vec![profile("a", 120.0)]);
        assert!(matches!(config.validate(), Err(ConfigFetchError::Invalid(_))));
        let config = WateringConfig::new(vec![profile("a", f64::NAN)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let config = WateringConfig::new(vec![profile("a", 30.0), profile("a", 40.0)]);
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn static_provider_returns_defaults() {
        let config = StaticWateringConfigProvider::default().load().await.unwrap();
        assert_eq!(config.plants.len(), 2);
        assert_eq!(config.plants[0].id, "plant-1");
        assert_eq!(config.plants[0].threshold_percent, 35.0);
        assert_eq!(config.plants[0].get_watering_duration(), Duration::from_millis(1500));
        assert_eq!(config.plants[1].get_min_interval(), Duration::from_secs(30));
        assert!(config.auto_watering_enabled);
    }

    #[tokio::test]
    async fn file_provider_rereads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"plants":[
                {{"id":"fern","name":"Fern","thresholdPercent":40,"wateringDurationMs":2000,"minIntervalMs":60000}}
            ]}}"#
        )
        .unwrap();
        file.flush().unwrap();
        let provider = FileWateringConfigProvider::new(file.path());

        let config = provider.load().await.unwrap();
        assert_eq!(config.plants, vec![PlantProfile {
            id: "fern".to_string(),
            name: "Fern".to_string(),
            threshold_percent: 40.0,
            watering_duration_ms: 2000,
            min_interval_ms: 60000,
        }]);
        assert!(config.auto_watering_enabled);

        std::fs::write(file.path(), r#"{"plants":[],"autoWateringEnabled":false}"#).unwrap();
        let config = provider.load().await.unwrap();
        assert!(config.plants.is_empty());
        assert!(!config.auto_watering_enabled);
    }

    #[tokio::test]
    async fn file_provider_reports_missing_and_malformed_files() {
        let provider = FileWateringConfigProvider::new("/nonexistent/watering.json");
        assert!(matches!(provider.load().await, Err(ConfigFetchError::Io(_))));

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        let provider = FileWateringConfigProvider::new(file.path());
        assert!(matches!(provider.load().await, Err(ConfigFetchError::Parse(_))));
    }
}
