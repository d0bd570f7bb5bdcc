// Step validation for the calibration workflow
//
// A captured step is usable when it saw at least one reading and the angle
// stayed within the configured spread while the window was open.

use crate::config::CalibrationConfig;

/// Validator for captured steps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepValidator {
    max_std_dev_deg: Option<f64>,
}

impl StepValidator {
    pub fn new(max_std_dev_deg: Option<f64>) -> Self {
        Self { max_std_dev_deg }
    }

    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self::new(config.max_step_std_dev_deg)
    }

    /// Validator accepting every non-empty step
    pub fn permissive() -> Self {
        Self::new(None)
    }

    /// Check a step's statistics
    ///
    /// # Returns
    /// * `Ok(())` - Step valid
    /// * `Err(String)` - Reason the step is not usable
    ///
    /// # Validation Rules
    /// * At least one reading
    /// * Standard deviation at most `max_std_dev_deg` when a limit is set
    pub fn check(&self, sample_count: usize, std_dev: f64) -> Result<(), String> {
        if sample_count == 0 {
            return Err("no readings captured".to_string());
        }

        if let Some(limit) = self.max_std_dev_deg {
            if std_dev.is_nan() || std_dev > limit {
                return Err(format!("unsteady: ±{:.1}° exceeds ±{:.1}°", std_dev, limit));
            }
        }

        Ok(())
    }
}

impl Default for StepValidator {
    fn default() -> Self {
        Self::from_config(&CalibrationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_step_valid() {
        let validator = StepValidator::new(Some(5.0));
        assert!(validator.check(100, 0.0).is_ok());
        assert!(validator.check(100, 5.0).is_ok());
    }

    #[test]
    fn test_unsteady_step_invalid() {
        let validator = StepValidator::new(Some(5.0));
        let result = validator.check(100, 7.31);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("±7.3"));
    }

    #[test]
    fn test_nan_spread_invalid() {
        let validator = StepValidator::new(Some(5.0));
        assert!(validator.check(10, f64::NAN).is_err());
    }

    #[test]
    fn test_empty_step_invalid() {
        assert!(StepValidator::permissive().check(0, 0.0).is_err());
    }

    #[test]
    fn test_permissive_accepts_any_spread() {
        let validator = StepValidator::permissive();
        assert!(validator.check(1, 1_000.0).is_ok());
    }

    #[test]
    fn test_default_uses_config_limit() {
        let validator = StepValidator::default();
        assert!(validator.check(100, 19.9).is_ok());
        assert!(validator.check(100, 20.1).is_err());
    }
}
