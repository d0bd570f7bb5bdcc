// Live sensor readout - continuous smoothed angles for the sensor screen
//
// Listens to the accelerometer (and the gyroscope when present), runs every
// reading through the angle pipeline and broadcasts one LiveReading per
// accelerometer update. Each axis is flagged when it leaves the level band.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::calibration::step::now_ms;
use crate::config::{ReadoutConfig, SensorConfig};
use crate::error::{log_sensor_error, SensorError};
use crate::estimator::{AnglePipeline, AngleTriple, Sample, SmoothingWindow};
use crate::sensor::{SampleHandler, SensorEvent, SensorSource, SensorSubscription};

/// Per-axis tilt flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiltStatus {
    Level,
    Tilted,
}

impl TiltStatus {
    pub fn classify(angle: f64, threshold_deg: f64) -> Self {
        if angle.abs() > threshold_deg {
            TiltStatus::Tilted
        } else {
            TiltStatus::Level
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiltIndicators {
    pub pitch: TiltStatus,
    pub roll: TiltStatus,
    pub yaw: TiltStatus,
}

impl TiltIndicators {
    pub fn from_angles(angles: &AngleTriple, threshold_deg: f64) -> Self {
        Self {
            pitch: TiltStatus::classify(angles.pitch, threshold_deg),
            roll: TiltStatus::classify(angles.roll, threshold_deg),
            yaw: TiltStatus::classify(angles.yaw, threshold_deg),
        }
    }

    pub fn any_tilted(&self) -> bool {
        [self.pitch, self.roll, self.yaw].contains(&TiltStatus::Tilted)
    }
}

/// One smoothed snapshot of the device orientation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    pub accel: Sample,
    pub accel_magnitude: f64,
    pub angles: AngleTriple,
    /// Latest smoothed gyroscope reading, absent without a gyroscope
    pub gyro: Option<Sample>,
    pub gyro_magnitude: Option<f64>,
    pub tilt: TiltIndicators,
    pub timestamp_ms: u64,
}

struct ReadoutState {
    pipeline: AnglePipeline,
    gyro_window: SmoothingWindow<Sample>,
    gyro: Option<Sample>,
    latest: Option<LiveReading>,
}

/// Running readout; listeners are removed when this is stopped or dropped
pub struct LiveReadout {
    state: Arc<Mutex<ReadoutState>>,
    accel: Option<SensorSubscription>,
    gyro: Option<SensorSubscription>,
}

impl LiveReadout {
    /// Start listening
    ///
    /// # Errors
    /// - Accelerometer unavailable or rejecting the listener
    ///
    /// A missing or failing gyroscope is logged and skipped.
    pub fn start(
        accel: Arc<dyn SensorSource>,
        gyro: Option<Arc<dyn SensorSource>>,
        sensor_config: &SensorConfig,
        readout_config: &ReadoutConfig,
        readings: broadcast::Sender<LiveReading>,
    ) -> Result<Self, SensorError> {
        if !accel.is_available() {
            let err = SensorError::Unavailable {
                sensor: accel.kind().to_string(),
            };
            log_sensor_error(&err, "start_readout");
            return Err(err);
        }

        let state = Arc::new(Mutex::new(ReadoutState {
            pipeline: AnglePipeline::from_config(sensor_config),
            gyro_window: SmoothingWindow::new(sensor_config.sample_window),
            gyro: None,
            latest: None,
        }));

        accel.set_update_interval(sensor_config.update_interval());
        let accel_subscription = SensorSubscription::acquire(
            accel,
            accel_handler(Arc::clone(&state), readout_config.tilt_warning_deg, readings),
        )
        .inspect_err(|err| log_sensor_error(err, "start_readout"))?;

        let gyro_subscription = match gyro {
            Some(gyro) if gyro.is_available() => {
                gyro.set_update_interval(sensor_config.update_interval());
                match SensorSubscription::acquire(gyro, gyro_handler(Arc::clone(&state))) {
                    Ok(subscription) => Some(subscription),
                    Err(err) => {
                        tracing::warn!("[Readout] Gyroscope listener rejected: {}", err);
                        None
                    }
                }
            }
            Some(gyro) => {
                tracing::warn!("[Readout] {} unavailable, continuing without it", gyro.kind());
                None
            }
            None => None,
        };

        tracing::info!(
            "[Readout] Started (gyroscope: {})",
            if gyro_subscription.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            state,
            accel: Some(accel_subscription),
            gyro: gyro_subscription,
        })
    }

    /// Most recent reading, if any has arrived
    pub fn latest(&self) -> Option<LiveReading> {
        lock(&self.state).and_then(|state| state.latest.clone())
    }

    pub fn has_gyroscope(&self) -> bool {
        self.gyro.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.accel.is_some()
    }

    /// Remove the listeners; later readings are ignored
    pub fn stop(&mut self) {
        if let Some(subscription) = self.accel.take() {
            subscription.release();
            tracing::info!("[Readout] Stopped");
        }
        if let Some(subscription) = self.gyro.take() {
            subscription.release();
        }
    }
}

impl Drop for LiveReadout {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(state: &Mutex<ReadoutState>) -> Option<MutexGuard<'_, ReadoutState>> {
    state.lock().ok()
}

fn accel_handler(
    state: Arc<Mutex<ReadoutState>>,
    tilt_warning_deg: f64,
    readings: broadcast::Sender<LiveReading>,
) -> SampleHandler {
    Box::new(move |event| match event {
        SensorEvent::Sample(raw) => {
            let Some(mut state) = lock(&state) else {
                return;
            };
            let output = state.pipeline.process(raw.to_sample());
            let reading = LiveReading {
                accel: output.sample,
                accel_magnitude: output.sample.magnitude(),
                angles: output.angles,
                gyro: state.gyro,
                gyro_magnitude: state.gyro.map(|g| g.magnitude()),
                tilt: TiltIndicators::from_angles(&output.angles, tilt_warning_deg),
                timestamp_ms: now_ms(),
            };
            state.latest = Some(reading.clone());
            drop(state);

            // no subscribers is fine
            let _ = readings.send(reading);
        }
        SensorEvent::Fault(err) => log_sensor_error(&err, "readout_accelerometer"),
    })
}

fn gyro_handler(state: Arc<Mutex<ReadoutState>>) -> SampleHandler {
    Box::new(move |event| match event {
        SensorEvent::Sample(raw) => {
            if let Some(mut state) = lock(&state) {
                let smoothed = state.gyro_window.push(raw.to_sample());
                state.gyro = Some(smoothed);
            }
        }
        SensorEvent::Fault(err) => log_sensor_error(&err, "readout_gyroscope"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{SensorKind, SimulatedSensor};

    fn manual(kind: SensorKind) -> Arc<SimulatedSensor> {
        Arc::new(SimulatedSensor::manual(kind))
    }

    #[test]
    fn test_tilt_classification() {
        assert_eq!(TiltStatus::classify(10.0, 10.0), TiltStatus::Level);
        assert_eq!(TiltStatus::classify(-10.5, 10.0), TiltStatus::Tilted);

        let indicators =
            TiltIndicators::from_angles(&AngleTriple::new(0.0, 15.0, -3.0), 10.0);
        assert_eq!(indicators.roll, TiltStatus::Tilted);
        assert_eq!(indicators.pitch, TiltStatus::Level);
        assert!(indicators.any_tilted());
    }

    #[test]
    fn test_readout_without_gyroscope() {
        let accel = manual(SensorKind::Accelerometer);
        let (tx, mut rx) = broadcast::channel(16);
        let readout = LiveReadout::start(
            accel.clone(),
            None,
            &SensorConfig::default(),
            &ReadoutConfig::default(),
            tx,
        )
        .unwrap();

        assert!(readout.latest().is_none());
        accel.emit_sample(Sample::new(0.0, 0.0, 1.0));

        let reading = rx.try_recv().unwrap();
        assert_eq!(reading.accel_magnitude, 1.0);
        assert_eq!(reading.angles, AngleTriple::new(0.0, 0.0, 0.0));
        assert!(reading.gyro.is_none());
        assert!(!reading.tilt.any_tilted());
        assert_eq!(readout.latest(), Some(reading));
        assert!(!readout.has_gyroscope());
    }

    #[test]
    fn test_readout_with_gyroscope() {
        let accel = manual(SensorKind::Accelerometer);
        let gyro = manual(SensorKind::Gyroscope);
        let (tx, mut rx) = broadcast::channel(16);
        let readout = LiveReadout::start(
            accel.clone(),
            Some(gyro.clone()),
            &SensorConfig::default(),
            &ReadoutConfig::default(),
            tx,
        )
        .unwrap();
        assert!(readout.has_gyroscope());

        gyro.emit_sample(Sample::new(0.0, 0.0, 3.0));
        gyro.emit_sample(Sample::new(0.0, 4.0, 3.0));
        accel.emit_sample(Sample::new(-1.0, 0.0, 0.0));

        let reading = rx.try_recv().unwrap();
        assert_eq!(reading.gyro, Some(Sample::new(0.0, 2.0, 3.0)));
        assert_eq!(reading.tilt.roll, TiltStatus::Tilted);
        assert!((reading.angles.roll - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_gyroscope_is_skipped() {
        let accel = manual(SensorKind::Accelerometer);
        let gyro = Arc::new(SimulatedSensor::unavailable(SensorKind::Gyroscope));
        let (tx, _rx) = broadcast::channel(16);

        let readout = LiveReadout::start(
            accel,
            Some(gyro.clone()),
            &SensorConfig::default(),
            &ReadoutConfig::default(),
            tx,
        )
        .unwrap();

        assert!(!readout.has_gyroscope());
        assert_eq!(gyro.listener_count(), 0);
    }

    #[test]
    fn test_unavailable_accelerometer_fails() {
        let accel = Arc::new(SimulatedSensor::unavailable(SensorKind::Accelerometer));
        let (tx, _rx) = broadcast::channel(16);

        let result = LiveReadout::start(
            accel,
            None,
            &SensorConfig::default(),
            &ReadoutConfig::default(),
            tx,
        );
        assert!(matches!(result, Err(SensorError::Unavailable { .. })));
    }

    #[test]
    fn test_stop_releases_listeners() {
        let accel = manual(SensorKind::Accelerometer);
        let gyro = manual(SensorKind::Gyroscope);
        let (tx, mut rx) = broadcast::channel(16);
        let mut readout = LiveReadout::start(
            accel.clone(),
            Some(gyro.clone()),
            &SensorConfig::default(),
            &ReadoutConfig::default(),
            tx,
        )
        .unwrap();

        readout.stop();
        assert!(!readout.is_running());
        assert_eq!(accel.listener_count(), 0);
        assert_eq!(gyro.listener_count(), 0);

        accel.emit_sample(Sample::new(0.0, 0.0, 1.0));
        assert!(rx.try_recv().is_err());

        drop(readout);
        assert_eq!(accel.unsubscribe_count(), 1);
    }
}
