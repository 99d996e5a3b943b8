//! Backend selection between simulated and real hardware.
//!
//! The platform probe is injected so selection can be tested on any host.

use std::io;
use std::sync::Arc;

use tracing::{info, warn};

use crate::embedded::configuration::HardwareMode;
use crate::embedded::fake::{FakeHardwareFactory, PlantStateStore};
use crate::embedded::HardwareFactory;
use crate::error::FactoryError;

const DEVICE_TREE_MODEL_PATH: &str = "/proc/device-tree/model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    /// Board model string, when the device tree exposes one.
    pub model: Option<String>,
}

impl PlatformInfo {
    pub fn is_target(&self) -> bool {
        if self.os != "linux" || !matches!(self.arch.as_str(), "arm" | "aarch64") {
            return false;
        }
        match &self.model {
            Some(model) => model.to_lowercase().contains("raspberry pi"),
            None => true,
        }
    }
}

pub trait PlatformProbe {
    fn probe(&self) -> io::Result<PlatformInfo>;
}

/// Inspects the running host.
pub struct SystemProbe;

impl PlatformProbe for SystemProbe {
    fn probe(&self) -> io::Result<PlatformInfo> {
        let os = std::env::consts::OS.to_string();
        let arch = std::env::consts::ARCH.to_string();
        let model = if os == "linux" && matches!(arch.as_str(), "arm" | "aarch64") {
            match std::fs::read_to_string(DEVICE_TREE_MODEL_PATH) {
                Ok(model) => Some(model.trim_end_matches('\0').to_string()),
                Err(e) => {
                    warn!(error = %e, path = DEVICE_TREE_MODEL_PATH, "Error detecting platform; assuming target board");
                    None
                }
            }
        } else {
            None
        };
        Ok(PlatformInfo { os, arch, model })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HardwareBackend {
    Mock,
    Real,
}

pub fn select_backend(
    mode: HardwareMode,
    platform: &io::Result<PlatformInfo>,
) -> Result<HardwareBackend, FactoryError> {
    let target = match platform {
        Ok(info) => info.is_target(),
        Err(e) => {
            warn!(error = %e, "Platform probe failed");
            false
        }
    };
    match mode {
        HardwareMode::Mock => Ok(HardwareBackend::Mock),
        HardwareMode::Detect if target => {
            warn!(mode = "real", "Real hardware mode not implemented; falling back to mock hardware");
            Ok(HardwareBackend::Mock)
        }
        HardwareMode::Detect => Ok(HardwareBackend::Mock),
        HardwareMode::Real if target => Ok(HardwareBackend::Real),
        HardwareMode::Real => Err(FactoryError::NotTargetPlatform(describe(platform))),
    }
}

pub fn create_hardware_factory(
    mode: HardwareMode,
    probe: &dyn PlatformProbe,
    simulation_seed: Option<u64>,
) -> Result<Box<dyn HardwareFactory>, FactoryError> {
    match select_backend(mode, &probe.probe())? {
        HardwareBackend::Mock => {
            info!(mode = "mock", "Using mock hardware");
            Ok(Box::new(FakeHardwareFactory::with_store(Arc::new(
                PlantStateStore::new(simulation_seed),
            ))))
        }
        HardwareBackend::Real => Err(FactoryError::RealHardwareUnimplemented),
    }
}

fn describe(platform: &io::Result<PlatformInfo>) -> String {
    match platform {
        Ok(info) => match &info.model {
            Some(model) => format!("{}/{} {}", info.os, info.arch, model),
            None => format!("{}/{}", info.os, info.arch),
        },
        Err(e) => format!("probe failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    struct FixedProbe(Option<PlatformInfo>);

    impl PlatformProbe for FixedProbe {
        fn probe(&self) -> io::Result<PlatformInfo> {
            self.0
                .clone()
                .ok_or_else(|| io::Error::new(io::ErrorKind::PermissionDenied, "no access"))
        }
    }

    fn pi() -> PlatformInfo {
        PlatformInfo {
            os: "linux".to_string(),
            arch: "aarch64".to_string(),
            model: Some("Raspberry Pi 4 Model B Rev 1.4".to_string()),
        }
    }

    fn laptop() -> PlatformInfo {
        PlatformInfo {
            os: "macos".to_string(),
            arch: "x86_64".to_string(),
            model: None,
        }
    }

    #[test]
    fn target_detection() {
        assert!(pi().is_target());
        assert!(!laptop().is_target());
        let unknown_arm = PlatformInfo {
            model: None,
            ..pi()
        };
        assert!(unknown_arm.is_target());
        let other_board = PlatformInfo {
            model: Some("Pine64 RockPro64".to_string()),
            ..pi()
        };
        assert!(!other_board.is_target());
    }

    #[test]
    fn mock_mode_always_mock() {
        assert_eq!(select_backend(HardwareMode::Mock, &Ok(pi())).unwrap(), HardwareBackend::Mock);
        assert_eq!(select_backend(HardwareMode::Mock, &Ok(laptop())).unwrap(), HardwareBackend::Mock);
    }

    #[test]
    #[traced_test]
    fn detect_on_target_falls_back_with_warning() {
        let backend = select_backend(HardwareMode::Detect, &Ok(pi())).unwrap();
        assert_eq!(backend, HardwareBackend::Mock);
        assert!(logs_contain("Real hardware mode not implemented"));
    }

    #[test]
    fn detect_off_target_or_probe_failure_is_mock() {
        assert_eq!(select_backend(HardwareMode::Detect, &Ok(laptop())).unwrap(), HardwareBackend::Mock);
        let failed = Err(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(select_backend(HardwareMode::Detect, &failed).unwrap(), HardwareBackend::Mock);
    }

    #[test]
    fn forced_real_off_target_is_rejected() {
        let result = select_backend(HardwareMode::Real, &Ok(laptop()));
        assert!(matches!(result, Err(FactoryError::NotTargetPlatform(_))));
        let failed = Err(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(matches!(
            select_backend(HardwareMode::Real, &failed),
            Err(FactoryError::NotTargetPlatform(_))
        ));
    }

    #[test]
    fn forced_real_on_target_fails_fast() {
        let result = create_hardware_factory(HardwareMode::Real, &FixedProbe(Some(pi())), None);
        assert!(matches!(result, Err(FactoryError::RealHardwareUnimplemented)));
    }

    #[test]
    fn factory_for_detect_is_usable() {
        let factory = create_hardware_factory(HardwareMode::Detect, &FixedProbe(None), Some(1)).unwrap();
        assert!(factory.create_sensor(0).is_ok());
    }
}
