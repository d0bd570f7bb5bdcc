// Sensor capability consumed from the host platform
//
// A SensorSource delivers raw readings to registered handlers. The host owns
// the platform listener; this crate only registers, configures, and releases.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::estimator::Sample;

/// Physical sensor behind a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
}

impl SensorKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "Accelerometer",
            SensorKind::Gyroscope => "Gyroscope",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Reading as delivered by the platform
///
/// Platform payloads can omit fields or carry NaN; [`RawSample::to_sample`]
/// coerces anything missing or non-finite to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl RawSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    pub fn to_sample(&self) -> Sample {
        fn coerce(value: Option<f64>) -> f64 {
            match value {
                Some(v) if v.is_finite() => v,
                _ => 0.0,
            }
        }

        Sample {
            x: coerce(self.x),
            y: coerce(self.y),
            z: coerce(self.z),
        }
    }
}

impl From<Sample> for RawSample {
    fn from(sample: Sample) -> Self {
        RawSample::new(sample.x, sample.y, sample.z)
    }
}

/// Event delivered to a registered handler
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Sample(RawSample),
    Fault(SensorError),
}

/// Handler invoked on the sensor's delivery context
pub type SampleHandler = Box<dyn Fn(SensorEvent) + Send + Sync>;

/// Opaque listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Platform sensor capability
///
/// Implementations must tolerate a subscribe immediately followed by an
/// unsubscribe, and unsubscribing an unknown id must be a no-op.
pub trait SensorSource: Send + Sync {
    fn kind(&self) -> SensorKind;

    fn is_available(&self) -> bool;

    fn set_update_interval(&self, interval: Duration);

    fn subscribe(&self, handler: SampleHandler) -> Result<SubscriptionId, SensorError>;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Scoped listener registration
///
/// The listener is removed when the guard is dropped, so every exit path of
/// the owner (completion, early stop, error, panic unwind) releases it.
pub struct SensorSubscription {
    source: Arc<dyn SensorSource>,
    id: Option<SubscriptionId>,
}

impl SensorSubscription {
    /// Register `handler` with `source`
    pub fn acquire(
        source: Arc<dyn SensorSource>,
        handler: SampleHandler,
    ) -> Result<Self, SensorError> {
        let id = source.subscribe(handler)?;
        tracing::debug!("[Sensor] {} listener added ({:?})", source.kind(), id);
        Ok(Self {
            source,
            id: Some(id),
        })
    }

    pub fn id(&self) -> Option<SubscriptionId> {
        self.id
    }

    /// Remove the listener now instead of at drop
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(id) = self.id.take() {
            self.source.unsubscribe(id);
            tracing::debug!("[Sensor] {} listener removed ({:?})", self.source.kind(), id);
        }
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SimulatedSensor;

    #[test]
    fn test_raw_sample_coercion() {
        let raw = RawSample {
            x: None,
            y: Some(f64::NAN),
            z: Some(0.98),
        };
        assert_eq!(raw.to_sample(), Sample::new(0.0, 0.0, 0.98));

        let raw = RawSample {
            x: Some(f64::INFINITY),
            y: Some(-0.2),
            z: None,
        };
        assert_eq!(raw.to_sample(), Sample::new(0.0, -0.2, 0.0));
    }

    #[test]
    fn test_sensor_kind_display() {
        assert_eq!(SensorKind::Accelerometer.to_string(), "Accelerometer");
        assert_eq!(SensorKind::Gyroscope.display_name(), "Gyroscope");
    }

    #[test]
    fn test_subscription_released_on_drop() {
        let sensor = Arc::new(SimulatedSensor::manual(SensorKind::Accelerometer));
        {
            let _guard =
                SensorSubscription::acquire(sensor.clone(), Box::new(|_| {})).unwrap();
            assert_eq!(sensor.listener_count(), 1);
        }
        assert_eq!(sensor.listener_count(), 0);
    }

    #[test]
    fn test_subscription_release_is_idempotent() {
        let sensor = Arc::new(SimulatedSensor::manual(SensorKind::Accelerometer));
        let guard = SensorSubscription::acquire(sensor.clone(), Box::new(|_| {})).unwrap();
        assert!(guard.id().is_some());
        guard.release();
        assert_eq!(sensor.listener_count(), 0);
        assert_eq!(sensor.unsubscribe_count(), 1);
    }
}
