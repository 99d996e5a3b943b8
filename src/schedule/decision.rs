use std::time::Duration;

use crate::schedule::configuration::PlantProfile;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WateringDecision {
    SkipAboveThreshold,
    SkipRecentlyWatered,
    Water,
}

/// Decide whether a plant needs water.
///
/// A reading equal to the threshold counts as moist enough. `since_last` is
/// `None` when the plant was never watered, which always satisfies the
/// minimum interval.
pub fn decide(reading_percent: f64, profile: &PlantProfile, since_last: Option<Duration>) -> WateringDecision {
    if reading_percent >= profile.threshold_percent {
        return WateringDecision::SkipAboveThreshold;
    }
    match since_last {
        Some(elapsed) if elapsed < profile.get_min_interval() => WateringDecision::SkipRecentlyWatered,
        _ => WateringDecision::Water,
    }
}
