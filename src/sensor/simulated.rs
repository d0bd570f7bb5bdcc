use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;

use super::source::{
    RawSample, SampleHandler, SensorEvent, SensorKind, SensorSource, SubscriptionId,
};
use crate::error::SensorError;
use crate::estimator::Sample;

/// Motion pattern produced by a [`SimulatedSensor`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulatedMotion {
    /// No driver task; readings only arrive through [`SimulatedSensor::emit`]
    Manual,
    /// The same reading on every tick
    Static(Sample),
    /// Gravity vector held at a roll angle, with uniform noise on the angle
    Tilt { roll_deg: f64, noise_deg: f64 },
    /// Roll oscillating around a centre, like a foot during gait
    Sway {
        center_deg: f64,
        amplitude_deg: f64,
        period_ms: u64,
    },
}

impl SimulatedMotion {
    fn sample_at(&self, elapsed_ms: u64, rng: &mut StdRng) -> Sample {
        match *self {
            SimulatedMotion::Manual => Sample::default(),
            SimulatedMotion::Static(sample) => sample,
            SimulatedMotion::Tilt {
                roll_deg,
                noise_deg,
            } => {
                let noise = if noise_deg > 0.0 {
                    rng.gen_range(-noise_deg..=noise_deg)
                } else {
                    0.0
                };
                gravity_at_roll(roll_deg + noise)
            }
            SimulatedMotion::Sway {
                center_deg,
                amplitude_deg,
                period_ms,
            } => {
                let phase = if period_ms == 0 {
                    0.0
                } else {
                    2.0 * PI * (elapsed_ms % period_ms) as f64 / period_ms as f64
                };
                gravity_at_roll(center_deg + amplitude_deg * phase.sin())
            }
        }
    }
}

/// Unit gravity vector whose roll is `roll_deg`
pub fn gravity_at_roll(roll_deg: f64) -> Sample {
    let roll = roll_deg.to_radians();
    Sample::new(-roll.sin(), 0.0, roll.cos())
}

type SharedHandler = Arc<dyn Fn(SensorEvent) + Send + Sync>;

struct SimState {
    handlers: HashMap<SubscriptionId, SharedHandler>,
    driver: Option<JoinHandle<()>>,
}

struct Shared {
    kind: SensorKind,
    motion: SimulatedMotion,
    seed: u64,
    fault_after: Option<u64>,
    available: AtomicBool,
    interval_ms: AtomicU64,
    next_id: AtomicU64,
    unsubscribes: AtomicU64,
    state: Mutex<SimState>,
}

impl Shared {
    fn snapshot_handlers(&self) -> Vec<SharedHandler> {
        match self.state.lock() {
            Ok(state) => state.handlers.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn dispatch(&self, event: SensorEvent) {
        for handler in self.snapshot_handlers() {
            handler(event.clone());
        }
    }
}

/// In-process sensor used by the CLI and tests
///
/// With a non-manual motion the first subscriber starts a tokio task that
/// emits one reading per update interval; the task exits once the last
/// listener is removed.
pub struct SimulatedSensor {
    shared: Arc<Shared>,
}

impl SimulatedSensor {
    pub fn new(kind: SensorKind, motion: SimulatedMotion) -> Self {
        Self {
            shared: Arc::new(Shared {
                kind,
                motion,
                seed: 0x5EED,
                fault_after: None,
                available: AtomicBool::new(true),
                interval_ms: AtomicU64::new(50),
                next_id: AtomicU64::new(1),
                unsubscribes: AtomicU64::new(0),
                state: Mutex::new(SimState {
                    handlers: HashMap::new(),
                    driver: None,
                }),
            }),
        }
    }

    /// Sensor without a driver task
    pub fn manual(kind: SensorKind) -> Self {
        Self::new(kind, SimulatedMotion::Manual)
    }

    /// Sensor reporting itself unavailable
    pub fn unavailable(kind: SensorKind) -> Self {
        let sensor = Self::manual(kind);
        sensor.set_available(false);
        sensor
    }

    /// Seed for the noise generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.seed = seed;
        }
        self
    }

    /// Deliver a fault instead of the reading after `samples` readings
    pub fn with_fault_after(mut self, samples: u64) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.fault_after = Some(samples);
        }
        self
    }

    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.shared.interval_ms.load(Ordering::SeqCst))
    }

    /// Push an event to every listener on the caller's thread
    pub fn emit(&self, event: SensorEvent) {
        self.shared.dispatch(event);
    }

    /// Push a well-formed reading
    pub fn emit_sample(&self, sample: Sample) {
        self.emit(SensorEvent::Sample(RawSample::from(sample)));
    }

    pub fn listener_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .map(|state| state.handlers.len())
            .unwrap_or(0)
    }

    /// Number of listeners removed so far
    pub fn unsubscribe_count(&self) -> u64 {
        self.shared.unsubscribes.load(Ordering::SeqCst)
    }

    fn spawn_driver(shared: Arc<Shared>) -> Result<JoinHandle<()>, SensorError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SensorError::SubscriptionRejected {
                reason: "simulated sensor needs a tokio runtime".to_string(),
            }
        })?;

        Ok(runtime.spawn(async move {
            let period_ms = shared.interval_ms.load(Ordering::SeqCst).max(1);
            let mut ticker = tokio::time::interval(Duration::from_millis(period_ms));
            let mut rng = StdRng::seed_from_u64(shared.seed);
            let mut emitted: u64 = 0;

            loop {
                ticker.tick().await;

                let handlers: Vec<SharedHandler> = {
                    let Ok(mut state) = shared.state.lock() else {
                        break;
                    };
                    if state.handlers.is_empty() {
                        state.driver = None;
                        break;
                    }
                    state.handlers.values().cloned().collect()
                };

                let event = match shared.fault_after {
                    Some(limit) if emitted >= limit => SensorEvent::Fault(SensorError::Fault {
                        reason: format!("{} stopped responding", shared.kind),
                    }),
                    _ => {
                        let sample = shared.motion.sample_at(emitted * period_ms, &mut rng);
                        SensorEvent::Sample(RawSample::from(sample))
                    }
                };
                let faulted = matches!(event, SensorEvent::Fault(_));

                for handler in handlers {
                    handler(event.clone());
                }
                emitted += 1;

                if faulted {
                    tracing::warn!("[Sensor] Simulated {} fault injected", shared.kind);
                    if let Ok(mut state) = shared.state.lock() {
                        state.driver = None;
                    }
                    break;
                }
            }
        }))
    }
}

impl SensorSource for SimulatedSensor {
    fn kind(&self) -> SensorKind {
        self.shared.kind
    }

    fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::SeqCst)
    }

    fn set_update_interval(&self, interval: Duration) {
        self.shared
            .interval_ms
            .store(interval.as_millis() as u64, Ordering::SeqCst);
    }

    fn subscribe(&self, handler: SampleHandler) -> Result<SubscriptionId, SensorError> {
        if !self.is_available() {
            return Err(SensorError::Unavailable {
                sensor: self.shared.kind.to_string(),
            });
        }

        let mut state = self
            .shared
            .state
            .lock()
            .map_err(|_| SensorError::SubscriptionRejected {
                reason: "listener table poisoned".to_string(),
            })?;

        if state.driver.is_none() && self.shared.motion != SimulatedMotion::Manual {
            state.driver = Some(Self::spawn_driver(Arc::clone(&self.shared))?);
        }

        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        state.handlers.insert(id, Arc::from(handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };

        if state.handlers.remove(&id).is_some() {
            self.shared.unsubscribes.fetch_add(1, Ordering::SeqCst);
        }

        if state.handlers.is_empty() {
            if let Some(driver) = state.driver.take() {
                driver.abort();
            }
        }
    }
}
