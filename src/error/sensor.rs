// Sensor error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Sensor error code constants
///
/// Error code range: 1001-1003
pub struct SensorErrorCodes {}

impl SensorErrorCodes {
    /// Sensor reported itself unavailable
    pub const UNAVAILABLE: i32 = 1001;

    /// Sensor stream failed while delivering samples
    pub const FAULT: i32 = 1002;

    /// Sensor refused a new listener
    pub const SUBSCRIPTION_REJECTED: i32 = 1003;
}

/// Log a sensor error with structured context
pub fn log_sensor_error(err: &SensorError, context: &str) {
    error!(
        "Sensor error in {}: code={}, component=SensorSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised at the sensor boundary
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// The platform reports the sensor as missing or inaccessible
    Unavailable { sensor: String },

    /// The sample stream failed after it was started
    Fault { reason: String },

    /// The sensor could not register another listener
    SubscriptionRejected { reason: String },
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::Unavailable { .. } => SensorErrorCodes::UNAVAILABLE,
            SensorError::Fault { .. } => SensorErrorCodes::FAULT,
            SensorError::SubscriptionRejected { .. } => SensorErrorCodes::SUBSCRIPTION_REJECTED,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::Unavailable { sensor } => format!("{} not available", sensor),
            SensorError::Fault { reason } => format!("Sensor fault: {}", reason),
            SensorError::SubscriptionRejected { reason } => {
                format!("Sensor subscription rejected: {}", reason)
            }
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_codes() {
        assert_eq!(
            SensorError::Unavailable {
                sensor: "Accelerometer".to_string()
            }
            .code(),
            SensorErrorCodes::UNAVAILABLE
        );
        assert_eq!(
            SensorError::Fault {
                reason: "x".to_string()
            }
            .code(),
            SensorErrorCodes::FAULT
        );
        assert_eq!(
            SensorError::SubscriptionRejected {
                reason: "x".to_string()
            }
            .code(),
            SensorErrorCodes::SUBSCRIPTION_REJECTED
        );
    }

    #[test]
    fn test_sensor_error_messages() {
        let err = SensorError::Unavailable {
            sensor: "Accelerometer".to_string(),
        };
        assert_eq!(err.message(), "Accelerometer not available");

        let err = SensorError::Fault {
            reason: "bus reset".to_string(),
        };
        assert_eq!(err.message(), "Sensor fault: bus reset");
    }

    #[test]
    fn test_sensor_error_display() {
        let err = SensorError::Fault {
            reason: "bus reset".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("SensorError"));
        assert!(display.contains("1002"));
    }
}
