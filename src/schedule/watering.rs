use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::FutureExt;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::communication::{SignalGuard, StopHandle};
use crate::embedded::configuration::LayoutConfig;
use crate::embedded::{HardwareFactory, MoistureReading, MoistureSensor, Pump, PumpOptions};
use crate::error::{CycleError, HardwareError, SchedulerError};
use crate::schedule::configuration::{PlantProfile, WateringConfigProvider};
use crate::schedule::decision::{decide, WateringDecision};
use crate::schedule::settings::Settings;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(5000);

/// One watering position: a sensor, the pump next to it and when it last ran.
pub struct HardwareSlot {
    sensor: Box<dyn MoistureSensor>,
    pump: Box<dyn Pump>,
    last_watered_at: Option<Instant>,
    last_watered_wall: Option<DateTime<Local>>,
}

impl HardwareSlot {
    pub fn new(sensor: Box<dyn MoistureSensor>, pump: Box<dyn Pump>) -> Self {
        HardwareSlot {
            sensor,
            pump,
            last_watered_at: None,
            last_watered_wall: None,
        }
    }
    pub fn get_sensor(&self) -> &dyn MoistureSensor {
        self.sensor.as_ref()
    }
    pub fn get_pump(&self) -> &dyn Pump {
        self.pump.as_ref()
    }
    pub fn get_last_watered_at(&self) -> Option<Instant> {
        self.last_watered_at
    }
    pub fn get_last_watered_wall(&self) -> Option<DateTime<Local>> {
        self.last_watered_wall
    }
}

/// This cycle's profile joined with the slot at the same position.
pub struct PlantRuntime<'a> {
    pub profile: &'a PlantProfile,
    pub slot: &'a mut HardwareSlot,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOptions {
    pub check_interval_ms: Option<f64>,
    pub sensor_timeout: Duration,
    pub pump_timeout_grace: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        SchedulerOptions::from(&Settings::default())
    }
}

impl From<&Settings> for SchedulerOptions {
    fn from(settings: &Settings) -> Self {
        SchedulerOptions {
            check_interval_ms: settings.check_interval_ms,
            sensor_timeout: Duration::from_millis(settings.sensor_timeout_ms),
            pump_timeout_grace: Duration::from_millis(settings.pump_timeout_grace_ms),
        }
    }
}

pub struct WateringScheduler {
    factory: Box<dyn HardwareFactory>,
    provider: Box<dyn WateringConfigProvider>,
    layout: LayoutConfig,
    options: SchedulerOptions,
    slots: Vec<HardwareSlot>,
    stop_handle: StopHandle,
}

/// Clears the running flag even if `start` is cancelled.
struct RunningGuard(StopHandle);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl WateringScheduler {
    pub fn new(
        factory: Box<dyn HardwareFactory>,
        provider: Box<dyn WateringConfigProvider>,
        layout: LayoutConfig,
        options: SchedulerOptions,
    ) -> WateringScheduler {
        WateringScheduler {
            factory,
            provider,
            layout,
            options,
            slots: Vec::new(),
            stop_handle: StopHandle::new(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn stop(&self) {
        self.stop_handle.stop();
    }

    pub fn get_state(&self) -> LoopState {
        match (self.stop_handle.is_running(), self.stop_handle.is_stop_requested()) {
            (false, _) => LoopState::Idle,
            (true, false) => LoopState::Running,
            (true, true) => LoopState::Stopping,
        }
    }

    pub fn get_slots(&self) -> &[HardwareSlot] {
        &self.slots
    }

    /// Runs the watering loop until [`stop`](Self::stop), SIGINT or SIGTERM.
    ///
    /// Returns an error only when the hardware slots could not be set up.
    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        if !self.stop_handle.begin() {
            warn!("Watering scheduler already running; ignoring start");
            return Ok(());
        }
        let _running = RunningGuard(self.stop_handle.clone());
        let signals = SignalGuard::register(self.stop_handle.clone());

        let result = self.run().await;
        if let Err(e) = &result {
            error!(error = %e, "Watering scheduler setup failed");
            self.stop_handle.stop();
        }

        drop(signals);
        if let Err(e) = self.factory.cleanup().await {
            error!(error = %e, "Hardware cleanup failed");
        }
        info!("Watering scheduler stopped");
        result
    }

    async fn run(&mut self) -> Result<(), SchedulerError> {
        let interval = resolve_check_interval(self.options.check_interval_ms);
        self.allocate_slots()?;
        info!(
            interval_ms = interval.as_millis() as u64,
            slots = self.slots.len(),
            "Watering scheduler started"
        );

        let mut stop_receiver = self.stop_handle.subscribe();
        while self.stop_handle.is_running() && !self.stop_handle.is_stop_requested() {
            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "Watering cycle aborted");
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop_receiver.wait_for(|stop| *stop) => {}
            }
        }
        Ok(())
    }

    /// Binds every slot of the layout once. Later starts reuse the slots.
    fn allocate_slots(&mut self) -> Result<(), HardwareError> {
        if !self.slots.is_empty() {
            return Ok(());
        }
        let mut slots = Vec::with_capacity(self.layout.get_slots().len());
        for slot_config in self.layout.get_slots() {
            let channel = slot_config.get_sensor_channel();
            let sensor = self.factory.create_sensor(channel)?;
            let pump = self.factory.create_pump(PumpOptions {
                gpio_pin: slot_config.get_pump_pin(),
                sensor_channel: Some(channel),
            })?;
            debug!(channel, pin = slot_config.get_pump_pin(), "Hardware slot allocated");
            slots.push(HardwareSlot::new(sensor, pump));
        }
        self.slots = slots;
        Ok(())
    }

    async fn run_cycle(&mut self) -> Result<(), CycleError> {
        let config = self.provider.load().await?;
        let plants = bind_plants(&config.plants, &mut self.slots)?;
        debug!(plants = plants.len(), "Running watering cycle");

        for plant in plants {
            let plant_id = plant.profile.id.clone();
            let check = check_plant(plant, &self.options, config.auto_watering_enabled);
            match AssertUnwindSafe(check).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(plant = %plant_id, error = %e, "Plant check failed"),
                Err(_) => error!(plant = %plant_id, "Plant check panicked"),
            }
        }
        Ok(())
    }
}

pub fn resolve_check_interval(configured_ms: Option<f64>) -> Duration {
    match configured_ms {
        Some(ms) if ms.is_finite() && ms > 0.0 => Duration::from_millis(ms.ceil() as u64),
        Some(ms) => {
            warn!(
                check_interval_ms = ms,
                default_ms = DEFAULT_CHECK_INTERVAL.as_millis() as u64,
                "Invalid check interval; using default"
            );
            DEFAULT_CHECK_INTERVAL
        }
        None => DEFAULT_CHECK_INTERVAL,
    }
}

pub fn bind_plants<'a>(
    profiles: &'a [PlantProfile],
    slots: &'a mut [HardwareSlot],
) -> Result<Vec<PlantRuntime<'a>>, CycleError> {
    if profiles.len() > slots.len() {
        return Err(CycleError::TooManyPlants {
            plants: profiles.len(),
            slots: slots.len(),
        });
    }
    Ok(profiles
        .iter()
        .zip(slots.iter_mut())
        .map(|(profile, slot)| PlantRuntime { profile, slot })
        .collect())
}

async fn check_plant(
    plant: PlantRuntime<'_>,
    options: &SchedulerOptions,
    auto_watering_enabled: bool,
) -> Result<(), HardwareError> {
    let PlantRuntime { profile, slot } = plant;
    let channel = slot.sensor.get_channel();
    let pin = slot.pump.get_pin();

    let reading = read_moisture(slot.sensor.as_ref(), options.sensor_timeout).await?;
    let since_last = slot.last_watered_at.map(|at| at.elapsed());

    match decide(reading.percent, profile, since_last) {
        WateringDecision::SkipAboveThreshold => {
            debug!(
                plant = %profile.id,
                channel,
                percent = reading.percent,
                threshold = profile.threshold_percent,
                "Moisture adequate; skipping"
            );
            return Ok(());
        }
        WateringDecision::SkipRecentlyWatered => {
            info!(
                plant = %profile.id,
                channel,
                percent = reading.percent,
                since_last_ms = since_last.map(|d| d.as_millis() as u64),
                min_interval_ms = profile.min_interval_ms,
                "Recently watered; skipping"
            );
            return Ok(());
        }
        WateringDecision::Water => {}
    }

    if !auto_watering_enabled {
        info!(
            plant = %profile.id,
            channel,
            percent = reading.percent,
            "Automatic watering disabled; not watering"
        );
        return Ok(());
    }

    info!(
        plant = %profile.id,
        channel,
        pin,
        percent = reading.percent,
        threshold = profile.threshold_percent,
        duration_ms = profile.watering_duration_ms,
        "Moisture below threshold; watering"
    );
    let duration = profile.get_watering_duration();
    let limit = duration + options.pump_timeout_grace;
    match timeout(limit, slot.pump.activate(duration)).await {
        Ok(result) => result?,
        Err(_) => {
            if let Err(e) = slot.pump.deactivate().await {
                error!(plant = %profile.id, pin, error = %e, "Pump deactivate after timeout failed");
            }
            return Err(HardwareError::Timeout {
                operation: "pump activation",
                after: limit,
            });
        }
    }

    slot.last_watered_at = Some(Instant::now());
    let watered_at = Local::now();
    slot.last_watered_wall = Some(watered_at);

    match read_moisture(slot.sensor.as_ref(), options.sensor_timeout).await {
        Ok(after) => info!(
            plant = %profile.id,
            channel,
            percent = after.percent,
            watered_at = %watered_at.format("%Y-%m-%d %H:%M:%S"),
            "Moisture after watering"
        ),
        Err(e) => warn!(plant = %profile.id, channel, error = %e, "Follow-up moisture reading failed"),
    }
    Ok(())
}

async fn read_moisture(sensor: &dyn MoistureSensor, limit: Duration) -> Result<MoistureReading, HardwareError> {
    match timeout(limit, sensor.read()).await {
        Ok(result) => result,
        Err(_) => Err(HardwareError::Timeout {
            operation: "sensor read",
            after: limit,
        }),
    }
}
