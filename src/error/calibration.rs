// Calibration error types and constants

use crate::error::{ErrorCode, SensorError};
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// These constants are the single source of truth for error codes the host
/// app maps to alerts ("Calibration failed", "Accelerometer not available").
///
/// Error code range: 2001-2006
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Sensor unavailable when the session started
    pub const SENSOR_UNAVAILABLE: i32 = 2001;

    /// Sensor failed while a capture window was open
    pub const SENSOR_FAULT: i32 = 2002;

    /// Calibration already in progress
    pub const ALREADY_IN_PROGRESS: i32 = 2003;

    /// Calibration configuration rejected
    pub const INVALID_CONFIG: i32 = 2004;

    /// Attempt to record more steps than configured
    pub const STEP_OVERFLOW: i32 = 2005;

    /// Calibration session lock was poisoned
    pub const STATE_POISONED: i32 = 2006;
}

/// Log a calibration error with structured context
///
/// This function logs calibration errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// These errors cover session start, the capture loop and session state
/// management. Every variant is fatal to the current run; there are no
/// retries and the caller restarts explicitly.
///
/// Error code ranges: 2001-2006
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Sensor reported unavailable at session start
    SensorUnavailable { sensor: String },

    /// Sensor failed mid-run
    SensorFault { reason: String },

    /// Calibration already in progress
    AlreadyInProgress,

    /// Configuration values cannot drive a session
    InvalidConfig { reason: String },

    /// Recording another step would exceed the configured total
    StepOverflow { total: usize },

    /// Calibration session Mutex was poisoned
    StatePoisoned,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::SensorUnavailable { .. } => {
                CalibrationErrorCodes::SENSOR_UNAVAILABLE
            }
            CalibrationError::SensorFault { .. } => CalibrationErrorCodes::SENSOR_FAULT,
            CalibrationError::AlreadyInProgress => CalibrationErrorCodes::ALREADY_IN_PROGRESS,
            CalibrationError::InvalidConfig { .. } => CalibrationErrorCodes::INVALID_CONFIG,
            CalibrationError::StepOverflow { .. } => CalibrationErrorCodes::STEP_OVERFLOW,
            CalibrationError::StatePoisoned => CalibrationErrorCodes::STATE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::SensorUnavailable { sensor } => {
                format!("{} not available", sensor)
            }
            CalibrationError::SensorFault { reason } => {
                format!("Sensor fault during capture: {}", reason)
            }
            CalibrationError::AlreadyInProgress => "Calibration already in progress".to_string(),
            CalibrationError::InvalidConfig { reason } => {
                format!("Invalid calibration config: {}", reason)
            }
            CalibrationError::StepOverflow { total } => {
                format!("Calibration already holds {} steps", total)
            }
            CalibrationError::StatePoisoned => "Calibration state lock poisoned".to_string(),
        }
    }
}

impl From<SensorError> for CalibrationError {
    fn from(err: SensorError) -> Self {
        match err {
            SensorError::Unavailable { sensor } => CalibrationError::SensorUnavailable { sensor },
            SensorError::Fault { reason } => CalibrationError::SensorFault { reason },
            SensorError::SubscriptionRejected { reason } => CalibrationError::SensorFault {
                reason: format!("subscription rejected: {}", reason),
            },
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
