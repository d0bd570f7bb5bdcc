// AppContext: Dependency Injection Container
// Owns the managers and channels one app instance needs, in place of globals

use std::sync::{Arc, Mutex, MutexGuard};

use futures::Stream;
use tokio::sync::broadcast;

use crate::calibration::{CalibrationEvent, CalibrationOutcome};
use crate::config::AppConfig;
use crate::error::{log_sensor_error, CalibrationError, SensorError};
use crate::managers::{BroadcastChannelManager, CalibrationManager};
use crate::readout::{LiveReading, LiveReadout};
use crate::sensor::SensorSource;

/// AppContext: Dependency injection container for all application state
///
/// - CalibrationManager with its session and sensor listener
/// - LiveReadout for the sensor screen, when running
/// - Calibration event and live reading broadcast channels
///
/// Each context is independent, so tests and multiple app instances never
/// share state.
pub struct AppContext {
    config: AppConfig,
    broadcasts: BroadcastChannelManager,
    calibration: Arc<CalibrationManager>,
    readout: Mutex<Option<LiveReadout>>,
    readings: broadcast::Sender<LiveReading>,
}

impl AppContext {
    /// Create a new AppContext
    ///
    /// Both broadcast channels are initialized here so subscribers can attach
    /// before anything is started.
    pub fn new(config: AppConfig) -> Self {
        let broadcasts = BroadcastChannelManager::new();
        let events = broadcasts.init_calibration(calibration_capacity(&config));
        let readings = broadcasts.init_readings(config.readout.channel_capacity);

        let calibration = Arc::new(CalibrationManager::new(
            config.calibration.clone(),
            config.sensor.clone(),
            events,
        ));

        Self {
            config,
            broadcasts,
            calibration,
            readout: Mutex::new(None),
            readings,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    /// Run a calibration against `accelerometer`
    ///
    /// See [`CalibrationManager::start`].
    pub async fn start_calibration(
        &self,
        accelerometer: Arc<dyn SensorSource>,
    ) -> Result<CalibrationOutcome, CalibrationError> {
        self.calibration.start(accelerometer).await
    }

    pub fn stop_calibration(&self) {
        self.calibration.stop();
    }

    /// Shared handle to the calibration manager, e.g. to spawn a run
    pub fn calibration(&self) -> Arc<CalibrationManager> {
        Arc::clone(&self.calibration)
    }

    pub fn subscribe_calibration(&self) -> Option<broadcast::Receiver<CalibrationEvent>> {
        self.broadcasts.subscribe_calibration()
    }

    /// Stream of calibration events
    pub fn calibration_stream(&self) -> impl Stream<Item = CalibrationEvent> + Send + 'static {
        self.calibration.event_stream()
    }

    // ========================================================================
    // LIVE READOUT
    // ========================================================================

    /// Start the live readout, replacing one already running
    ///
    /// # Errors
    /// - Accelerometer unavailable
    /// - Lock poisoning on readout state
    pub fn start_readout(
        &self,
        accelerometer: Arc<dyn SensorSource>,
        gyroscope: Option<Arc<dyn SensorSource>>,
    ) -> Result<(), SensorError> {
        let mut guard = self.lock_readout()?;
        // release the old listeners before registering new ones
        *guard = None;

        let readout = LiveReadout::start(
            accelerometer,
            gyroscope,
            &self.config.sensor,
            &self.config.readout,
            self.readings.clone(),
        )?;
        *guard = Some(readout);
        Ok(())
    }

    /// Stop the live readout; no-op if not running
    pub fn stop_readout(&self) -> Result<(), SensorError> {
        let mut guard = self.lock_readout()?;
        if let Some(mut readout) = guard.take() {
            readout.stop();
        }
        Ok(())
    }

    pub fn is_readout_running(&self) -> bool {
        self.lock_readout()
            .map(|guard| guard.as_ref().is_some_and(|r| r.is_running()))
            .unwrap_or(false)
    }

    pub fn latest_reading(&self) -> Option<LiveReading> {
        self.lock_readout()
            .ok()?
            .as_ref()
            .and_then(|readout| readout.latest())
    }

    pub fn subscribe_readings(&self) -> Option<broadcast::Receiver<LiveReading>> {
        self.broadcasts.subscribe_readings()
    }

    fn lock_readout(&self) -> Result<MutexGuard<'_, Option<LiveReadout>>, SensorError> {
        self.readout.lock().map_err(|_| {
            let err = SensorError::SubscriptionRejected {
                reason: "readout state poisoned".to_string(),
            };
            log_sensor_error(&err, "lock_readout");
            err
        })
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

/// Room for every event of one run: per-poll readings plus step markers
fn calibration_capacity(config: &AppConfig) -> usize {
    let calibration = &config.calibration;
    let polls_per_step = calibration
        .capture_duration_ms
        .checked_div(calibration.poll_interval_ms)
        .unwrap_or(0) as usize;
    calibration
        .total_steps
        .saturating_mul(polls_per_step.saturating_add(3))
        .saturating_add(4)
        .clamp(16, 4096)
}
