//! Simulated sensors and pumps for development and tests.
//!
//! Every plant is a single moisture value shared between the sensor that
//! reads it and the pump that waters it. Readings drift slightly toward dry,
//! pump runs push the value up by a bounded amount.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::embedded::{HardwareFactory, MoistureReading, MoistureSensor, Pump, PumpOptions};
use crate::error::HardwareError;

const INITIAL_MOISTURE_BASE: f64 = 45.0;
const INITIAL_MOISTURE_SPREAD: f64 = 10.0;
const DRIFT_BIAS: f64 = 0.55;
const DRIFT_SCALE: f64 = 1.5;
const GAIN_MS_PER_PERCENT: f64 = 600.0;
const GAIN_JITTER: f64 = 2.0;
const MAX_GAIN: f64 = 30.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StateKey {
    Sensor(u8),
    Pump(u8),
}

#[derive(Debug)]
pub struct PlantState {
    moisture_percent: f64,
}

impl PlantState {
    pub fn get_moisture_percent(&self) -> f64 {
        self.moisture_percent
    }
}

/// Seeded random source so simulations can be replayed in tests.
pub struct SimRng {
    inner: Mutex<ChaCha8Rng>,
}

impl SimRng {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        SimRng {
            inner: Mutex::new(rng),
        }
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&self) -> f64 {
        lock(&self.inner).gen::<f64>()
    }
}

/// Plant states keyed by sensor channel or pump pin, created on first access.
pub struct PlantStateStore {
    states: Mutex<HashMap<StateKey, Arc<Mutex<PlantState>>>>,
    rng: Arc<SimRng>,
}

impl PlantStateStore {
    pub fn new(seed: Option<u64>) -> Self {
        PlantStateStore {
            states: Mutex::new(HashMap::new()),
            rng: Arc::new(SimRng::new(seed)),
        }
    }

    pub fn get_state(&self, key: StateKey) -> Arc<Mutex<PlantState>> {
        let mut states = lock(&self.states);
        let rng = &self.rng;
        Arc::clone(states.entry(key).or_insert_with(|| {
            let moisture_percent = INITIAL_MOISTURE_BASE + rng.next_f64() * INITIAL_MOISTURE_SPREAD;
            debug!(?key, moisture_percent, "Seeding simulated plant state");
            Arc::new(Mutex::new(PlantState { moisture_percent }))
        }))
    }

    pub fn set_moisture(&self, key: StateKey, percent: f64) {
        let state = self.get_state(key);
        lock(&state).moisture_percent = percent.clamp(0.0, 100.0);
    }

    pub fn get_moisture(&self, key: StateKey) -> Option<f64> {
        lock(&self.states)
            .get(&key)
            .map(|state| lock(state).moisture_percent)
    }

    pub fn get_rng(&self) -> Arc<SimRng> {
        Arc::clone(&self.rng)
    }
}

impl Default for PlantStateStore {
    fn default() -> Self {
        PlantStateStore::new(None)
    }
}

pub struct FakeMoistureSensor {
    channel: u8,
    state: Arc<Mutex<PlantState>>,
    rng: Arc<SimRng>,
}

#[async_trait]
impl MoistureSensor for FakeMoistureSensor {
    async fn read(&self) -> Result<MoistureReading, HardwareError> {
        let drift = (self.rng.next_f64() - DRIFT_BIAS) * DRIFT_SCALE;
        let moisture = {
            let mut state = lock(&self.state);
            state.moisture_percent = (state.moisture_percent + drift).clamp(0.0, 100.0);
            state.moisture_percent
        };
        let reading = MoistureReading::from_percent(moisture);
        debug!(channel = self.channel, percent = reading.percent, raw = reading.raw, "Mock sensor reading");
        Ok(reading)
    }

    fn get_channel(&self) -> u8 {
        self.channel
    }
}

pub struct FakePump {
    pin: u8,
    state: Arc<Mutex<PlantState>>,
    rng: Arc<SimRng>,
    /// Id of the activation currently running, if any.
    activation: Mutex<Option<u64>>,
    next_activation: AtomicU64,
    /// Last activation id cut short by `deactivate`.
    early_stop: watch::Sender<u64>,
}

impl FakePump {
    fn new(pin: u8, state: Arc<Mutex<PlantState>>, rng: Arc<SimRng>) -> Self {
        let (early_stop, _) = watch::channel(0);
        FakePump {
            pin,
            state,
            rng,
            activation: Mutex::new(None),
            next_activation: AtomicU64::new(1),
            early_stop,
        }
    }
}

/// Releases the pump when an activation ends, unless `deactivate` already
/// handed it to a newer activation.
struct ActivationGuard<'a> {
    activation: &'a Mutex<Option<u64>>,
    id: u64,
}

impl Drop for ActivationGuard<'_> {
    fn drop(&mut self) {
        let mut current = lock(self.activation);
        if *current == Some(self.id) {
            *current = None;
        }
    }
}

#[async_trait]
impl Pump for FakePump {
    async fn activate(&self, duration: Duration) -> Result<(), HardwareError> {
        let id = self.next_activation.fetch_add(1, Ordering::SeqCst);
        {
            let mut current = lock(&self.activation);
            if current.is_some() {
                warn!(pin = self.pin, "Pump already active; ignoring activate");
                return Ok(());
            }
            *current = Some(id);
        }
        let activation = ActivationGuard {
            activation: &self.activation,
            id,
        };
        let mut early_stop = self.early_stop.subscribe();
        info!(pin = self.pin, duration_ms = duration.as_millis() as u64, "Pump activating");

        let stopped_early = tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = early_stop.wait_for(|stopped| *stopped == id) => true,
        };
        if stopped_early {
            info!(pin = self.pin, "Pump activation cut short");
            return Ok(());
        }

        let gain = (duration.as_millis() as f64 / GAIN_MS_PER_PERCENT + self.rng.next_f64() * GAIN_JITTER)
            .clamp(0.0, MAX_GAIN);
        let moisture = {
            let mut state = lock(&self.state);
            state.moisture_percent = (state.moisture_percent + gain).clamp(0.0, 100.0);
            state.moisture_percent
        };
        drop(activation);

        info!(pin = self.pin, moisture_percent = moisture, "Pump finished");
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), HardwareError> {
        let stopped = lock(&self.activation).take();
        if let Some(id) = stopped {
            self.early_stop.send_replace(id);
            warn!(pin = self.pin, "Pump deactivated early");
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        lock(&self.activation).is_some()
    }

    fn get_pin(&self) -> u8 {
        self.pin
    }
}

pub struct FakeHardwareFactory {
    store: Arc<PlantStateStore>,
}

impl FakeHardwareFactory {
    pub fn new(seed: Option<u64>) -> Self {
        FakeHardwareFactory::with_store(Arc::new(PlantStateStore::new(seed)))
    }

    pub fn with_store(store: Arc<PlantStateStore>) -> Self {
        FakeHardwareFactory { store }
    }

    pub fn get_store(&self) -> &Arc<PlantStateStore> {
        &self.store
    }
}

impl Drop for FakeHardwareFactory {
    fn drop(&mut self) {
        debug!("Drop mock hardware factory");
    }
}

#[async_trait]
impl HardwareFactory for FakeHardwareFactory {
    fn create_sensor(&self, channel: u8) -> Result<Box<dyn MoistureSensor>, HardwareError> {
        Ok(Box::new(FakeMoistureSensor {
            channel,
            state: self.store.get_state(StateKey::Sensor(channel)),
            rng: self.store.get_rng(),
        }))
    }

    fn create_pump(&self, options: PumpOptions) -> Result<Box<dyn Pump>, HardwareError> {
        let key = match options.sensor_channel {
            Some(channel) => StateKey::Sensor(channel),
            None => StateKey::Pump(options.gpio_pin),
        };
        Ok(Box::new(FakePump::new(
            options.gpio_pin,
            self.store.get_state(key),
            self.store.get_rng(),
        )))
    }

    async fn cleanup(&self) -> Result<(), HardwareError> {
        info!("Mock hardware cleanup complete");
        Ok(())
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
