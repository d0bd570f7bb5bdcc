//! Configuration management for calibration tuning
//!
//! This module provides runtime configuration loading from JSON files so
//! capture timing, smoothing and validity thresholds can be adjusted
//! without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::CalibrationError;
use crate::estimator::CaptureAxis;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub calibration: CalibrationConfig,
    pub sensor: SensorConfig,
    pub readout: ReadoutConfig,
}

/// Upper bound on `total_steps` accepted by [`CalibrationConfig::validate`]
pub const MAX_TOTAL_STEPS: usize = 100;

/// Calibration session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Number of capture steps per run
    pub total_steps: usize,
    /// Length of each capture window
    pub capture_duration_ms: u64,
    /// Interval between angle slot polls inside a capture window
    pub poll_interval_ms: u64,
    /// Pause after each captured step
    pub inter_step_delay_ms: u64,
    /// Valid steps required for a usable calibration
    pub min_valid_steps: usize,
    /// Maximum per-step standard deviation (degrees) for a step to count as
    /// valid; `None` accepts every non-empty step
    ///
    /// Steps are captured while walking, so the default only rejects erratic
    /// captures: a sinusoidal swing has std-dev of amplitude/√2, so the 20°
    /// default accepts gait swings up to about ±28°. Set `None` to count
    /// every capture as valid.
    pub max_step_std_dev_deg: Option<f64>,
    /// Angle fed into the calibration slot
    pub capture_axis: CaptureAxis,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            total_steps: 5,
            capture_duration_ms: 5000,
            poll_interval_ms: 50,
            inter_step_delay_ms: 1000,
            min_valid_steps: 4,
            max_step_std_dev_deg: Some(20.0),
            capture_axis: CaptureAxis::Roll,
        }
    }
}

impl CalibrationConfig {
    pub fn capture_duration(&self) -> Duration {
        Duration::from_millis(self.capture_duration_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn inter_step_delay(&self) -> Duration {
        Duration::from_millis(self.inter_step_delay_ms)
    }

    /// Reject configurations that cannot drive a session
    ///
    /// # Errors
    /// - zero steps, more than `MAX_TOTAL_STEPS`, or zero poll interval
    /// - capture window shorter than one poll interval
    /// - more valid steps required than steps captured
    /// - negative or non-finite std-dev threshold
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let reason = if self.total_steps == 0 {
            Some("total_steps must be at least 1".to_string())
        } else if self.total_steps > MAX_TOTAL_STEPS {
            Some(format!(
                "total_steps ({}) exceeds {}",
                self.total_steps, MAX_TOTAL_STEPS
            ))
        } else if self.poll_interval_ms == 0 {
            Some("poll_interval_ms must be greater than 0".to_string())
        } else if self.capture_duration_ms < self.poll_interval_ms {
            Some(format!(
                "capture_duration_ms ({}) shorter than poll_interval_ms ({})",
                self.capture_duration_ms, self.poll_interval_ms
            ))
        } else if self.min_valid_steps > self.total_steps {
            Some(format!(
                "min_valid_steps ({}) exceeds total_steps ({})",
                self.min_valid_steps, self.total_steps
            ))
        } else {
            match self.max_step_std_dev_deg {
                Some(limit) if !limit.is_finite() || limit < 0.0 => {
                    Some(format!("max_step_std_dev_deg {} must be >= 0", limit))
                }
                _ => None,
            }
        };

        match reason {
            Some(reason) => Err(CalibrationError::InvalidConfig { reason }),
            None => Ok(()),
        }
    }
}

/// Sensor acquisition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Update interval requested from the platform sensor
    pub update_interval_ms: u64,
    /// Smoothing window for raw samples
    pub sample_window: usize,
    /// Smoothing window for derived angles
    pub angle_window: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 50,
            sample_window: 3,
            angle_window: 3,
        }
    }
}

impl SensorConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

/// Live readout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadoutConfig {
    /// Absolute angle (degrees) above which an axis is flagged
    pub tilt_warning_deg: f64,
    /// Broadcast buffer for live readings
    pub channel_capacity: usize,
}

impl Default for ReadoutConfig {
    fn default() -> Self {
        Self {
            tilt_warning_deg: 10.0,
            channel_capacity: 64,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file is missing or
    /// its JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.calibration.total_steps, 5);
        assert_eq!(config.calibration.capture_duration_ms, 5000);
        assert_eq!(config.calibration.poll_interval_ms, 50);
        assert_eq!(config.calibration.inter_step_delay_ms, 1000);
        assert_eq!(config.calibration.min_valid_steps, 4);
        assert_eq!(config.calibration.capture_axis, CaptureAxis::Roll);
        assert_eq!(config.sensor.update_interval_ms, 50);
        assert_eq!(config.sensor.sample_window, 3);
        assert_eq!(config.readout.tilt_warning_deg, 10.0);
        assert!(config.calibration.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.calibration, config.calibration);
        assert_eq!(parsed.sensor, config.sensor);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"calibration":{"total_steps":3}}"#).unwrap();
        assert_eq!(parsed.calibration.total_steps, 3);
        assert_eq!(parsed.calibration.poll_interval_ms, 50);
        assert_eq!(parsed.readout.channel_capacity, 64);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/fes_config.json");
        assert_eq!(config.calibration, CalibrationConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CalibrationConfig {
            total_steps: 0,
            ..CalibrationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CalibrationError::InvalidConfig { .. })
        ));

        config.total_steps = 5;
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.poll_interval_ms = 50;
        config.capture_duration_ms = 10;
        assert!(config.validate().is_err());

        config.capture_duration_ms = 5000;
        config.min_valid_steps = 6;
        assert!(config.validate().is_err());

        config.min_valid_steps = 4;
        config.max_step_std_dev_deg = Some(-1.0);
        assert!(config.validate().is_err());

        config.max_step_std_dev_deg = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_step_count() {
        let mut config = CalibrationConfig {
            total_steps: MAX_TOTAL_STEPS,
            ..CalibrationConfig::default()
        };
        assert!(config.validate().is_ok());

        config.total_steps = MAX_TOTAL_STEPS + 1;
        assert!(matches!(
            config.validate(),
            Err(CalibrationError::InvalidConfig { .. })
        ));

        config.total_steps = usize::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_step_count_from_json_parses() {
        let config: AppConfig =
            serde_json::from_str(r#"{"calibration":{"total_steps":9223372036854775807}}"#)
                .unwrap();
        assert!(config.calibration.validate().is_err());
    }
}
