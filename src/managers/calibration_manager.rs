// CalibrationManager: Focused manager for the calibration workflow
//
// Single Responsibility: one calibration session, its sensor listener and
// the start/stop/query surface the UI calls into

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::calibration::procedure::{mark_failed, run_session};
use crate::calibration::{
    CalibrationEvent, CalibrationOutcome, CalibrationSession, CalibrationStep, SessionState,
};
use crate::config::{CalibrationConfig, SensorConfig};
use crate::error::{log_calibration_error, log_sensor_error, CalibrationError};
use crate::estimator::AnglePipeline;
use crate::sensor::{AngleSlot, SampleHandler, SensorEvent, SensorSource, SensorSubscription};

/// Manages one calibration session at a time
///
/// Single Responsibility: Calibration lifecycle and result queries
///
/// This manager handles:
/// - Starting a run (single flight: a second concurrent start is rejected)
/// - Registering the accelerometer listener for the run and releasing it on
///   every exit path
/// - Cooperative stop, checked by the capture loop once per poll
/// - Result queries while and after a run
///
/// # Example
/// ```ignore
/// let manager = CalibrationManager::new(config, sensor_config, events_tx);
/// let outcome = manager.start(accelerometer).await?;
/// let target = manager.get_average_angle()?;
/// ```
pub struct CalibrationManager {
    config: CalibrationConfig,
    sensor_config: SensorConfig,
    session: Arc<Mutex<CalibrationSession>>,
    slot: AngleSlot,
    stop_requested: Arc<AtomicBool>,
    events: broadcast::Sender<CalibrationEvent>,
}

impl CalibrationManager {
    /// Create a new CalibrationManager
    ///
    /// Initializes with an idle session and a zeroed angle slot. Progress is
    /// published on `events`.
    pub fn new(
        config: CalibrationConfig,
        sensor_config: SensorConfig,
        events: broadcast::Sender<CalibrationEvent>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(CalibrationSession::new(&config))),
            config,
            sensor_config,
            slot: AngleSlot::default(),
            stop_requested: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Run a calibration against `sensor`
    ///
    /// Clears previous results, checks sensor availability, registers a
    /// listener that feeds the smoothed capture-axis angle into the slot, and
    /// drives the capture loop. The listener is removed before this returns,
    /// whatever the result. Dropping the future mid-run cancels the session.
    ///
    /// # Returns
    /// * `Ok(CalibrationOutcome::Completed)` - every step captured
    /// * `Ok(CalibrationOutcome::Stopped)` - [`stop`](Self::stop) was called
    /// * `Err(CalibrationError)` - the run could not start or faulted
    ///
    /// # Errors
    /// - Calibration already in progress
    /// - Invalid configuration
    /// - Sensor unavailable, or failed mid-run
    /// - Lock poisoning on the session
    pub async fn start(
        &self,
        sensor: Arc<dyn SensorSource>,
    ) -> Result<CalibrationOutcome, CalibrationError> {
        self.config.validate().inspect_err(|err| {
            log_calibration_error(err, "start_calibration");
        })?;

        {
            let mut session = self.lock_session()?;
            session.begin().inspect_err(|err| {
                log_calibration_error(err, "start_calibration");
            })?;
            // stop() sets the flag under the same lock, so a stop issued
            // after begin() is never cleared here
            self.stop_requested.store(false, Ordering::SeqCst);
        }
        self.slot.reset();

        let _abandoned = AbandonedRunGuard {
            session: &self.session,
            events: &self.events,
        };

        match self.run(sensor).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                mark_failed(&self.session, &err, &self.events, "start_calibration");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        sensor: Arc<dyn SensorSource>,
    ) -> Result<CalibrationOutcome, CalibrationError> {
        if !sensor.is_available() {
            return Err(CalibrationError::SensorUnavailable {
                sensor: sensor.kind().to_string(),
            });
        }

        sensor.set_update_interval(self.sensor_config.update_interval());
        let _subscription = SensorSubscription::acquire(sensor, self.angle_handler())?;

        run_session(
            &self.slot,
            &self.config,
            &self.session,
            &self.events,
            &self.stop_requested,
        )
        .await
    }

    /// Listener converting raw readings into the capture-axis angle
    fn angle_handler(&self) -> SampleHandler {
        let slot = self.slot.clone();
        let axis = self.config.capture_axis;
        let pipeline = Mutex::new(AnglePipeline::from_config(&self.sensor_config));

        Box::new(move |event| match event {
            SensorEvent::Sample(raw) => {
                if let Ok(mut pipeline) = pipeline.lock() {
                    let output = pipeline.process(raw.to_sample());
                    slot.publish(output.angles.axis(axis));
                }
            }
            SensorEvent::Fault(err) => {
                log_sensor_error(&err, "calibration_listener");
                slot.fault(err);
            }
        })
    }

    /// Request the running calibration to stop
    ///
    /// Takes effect at the next poll of the capture loop. Steps captured so
    /// far are kept; no completion event is published.
    pub fn stop(&self) {
        tracing::info!("[Calibration] Stop requested");
        let _session = self.lock_session();
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Push an angle computed elsewhere (e.g. a live readout screen) into the
    /// slot the capture loop reads
    pub fn update_angle(&self, angle: f64) {
        self.slot.publish(angle);
    }

    /// Latest angle in the slot
    pub fn current_angle(&self) -> Option<f64> {
        use crate::sensor::AngleSource;
        self.slot.read_angle().ok()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn get_results(&self) -> Result<Vec<CalibrationStep>, CalibrationError> {
        Ok(self.lock_session()?.steps().to_vec())
    }

    pub fn get_valid_results(&self) -> Result<Vec<CalibrationStep>, CalibrationError> {
        Ok(self.lock_session()?.valid_steps())
    }

    /// Mean of all step averages; 0 when nothing is recorded
    pub fn get_average_angle(&self) -> Result<f64, CalibrationError> {
        Ok(self.lock_session()?.average_angle())
    }

    /// Mean over steps that passed the steadiness check
    pub fn get_average_valid_angle(&self) -> Result<f64, CalibrationError> {
        Ok(self.lock_session()?.average_valid_angle())
    }

    pub fn is_complete(&self) -> Result<bool, CalibrationError> {
        Ok(self.lock_session()?.is_complete())
    }

    /// Enough valid steps for a usable calibration
    pub fn has_valid_calibration(&self) -> Result<bool, CalibrationError> {
        Ok(self.lock_session()?.has_enough_valid_steps())
    }

    pub fn state(&self) -> Result<SessionState, CalibrationError> {
        Ok(self.lock_session()?.state())
    }

    pub fn is_running(&self) -> bool {
        self.lock_session()
            .map(|session| session.is_running())
            .unwrap_or(false)
    }

    /// Drop results of a finished run
    ///
    /// # Errors
    /// - Calibration in progress
    pub fn reset(&self) -> Result<(), CalibrationError> {
        let mut session = self.lock_session()?;
        if session.is_running() {
            let err = CalibrationError::AlreadyInProgress;
            log_calibration_error(&err, "reset_calibration");
            return Err(err);
        }
        session.reset();
        Ok(())
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<CalibrationEvent> {
        self.events.subscribe()
    }

    /// Events as a stream; a subscriber that falls behind skips the oldest
    pub fn event_stream(&self) -> impl Stream<Item = CalibrationEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe())
            .filter_map(|item| futures::future::ready(item.ok()))
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, CalibrationSession>, CalibrationError> {
        self.session.lock().map_err(|_| {
            let err = CalibrationError::StatePoisoned;
            log_calibration_error(&err, "lock_session");
            err
        })
    }
}

/// Cancels a session left running when the `start` future is dropped
/// mid-run (timeout, `select!`, aborted task)
struct AbandonedRunGuard<'a> {
    session: &'a Mutex<CalibrationSession>,
    events: &'a broadcast::Sender<CalibrationEvent>,
}

impl Drop for AbandonedRunGuard<'_> {
    fn drop(&mut self) {
        let mut session = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !session.is_running() {
            return;
        }
        session.cancel();
        let steps_captured = session.steps().len();
        drop(session);

        tracing::warn!(
            "[Calibration] Run abandoned by its caller after {} steps",
            steps_captured
        );
        let _ = self.events.send(CalibrationEvent::Stopped { steps_captured });
    }
}
