// Captured calibration steps and the per-window accumulator that builds them

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::validation::StepValidator;

/// One completed capture window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStep {
    /// 1-based position in the run
    pub step_index: usize,
    /// Arithmetic mean of every reading taken in the window
    pub average_angle: f64,
    /// Wall-clock capture time, milliseconds since the Unix epoch
    pub captured_at_ms: u64,
    pub sample_count: usize,
    /// Population standard deviation of the readings
    pub std_dev: f64,
    pub min_angle: f64,
    pub max_angle: f64,
    pub is_valid: bool,
}

/// Running sum/count plus spread statistics for one window
#[derive(Debug, Clone, Default)]
pub struct StepAccumulator {
    sum: f64,
    count: usize,
    // Welford running mean and sum of squared deviations
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl StepAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, angle: f64) {
        if self.count == 0 {
            self.min = angle;
            self.max = angle;
        } else {
            self.min = self.min.min(angle);
            self.max = self.max.max(angle);
        }

        self.sum += angle;
        self.count += 1;

        let delta = angle - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (angle - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// `sum / count`, 0 when nothing was read
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }

    /// Close the window into an immutable step
    pub fn finish(
        &self,
        step_index: usize,
        captured_at_ms: u64,
        validator: &StepValidator,
    ) -> CalibrationStep {
        let std_dev = self.std_dev();
        CalibrationStep {
            step_index,
            average_angle: self.average(),
            captured_at_ms,
            sample_count: self.count,
            std_dev,
            min_angle: self.min,
            max_angle: self.max,
            is_valid: validator.check(self.count, std_dev).is_ok(),
        }
    }
}

/// Milliseconds since the Unix epoch, 0 if the clock is before it
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_readings() {
        let mut acc = StepAccumulator::new();
        for _ in 0..100 {
            acc.push(37.5);
        }
        assert_eq!(acc.count(), 100);
        assert_eq!(acc.average(), 37.5);
        assert_eq!(acc.std_dev(), 0.0);

        let step = acc.finish(1, 1_000, &StepValidator::default());
        assert_eq!(step.step_index, 1);
        assert_eq!(step.average_angle, 37.5);
        assert_eq!(step.min_angle, 37.5);
        assert_eq!(step.max_angle, 37.5);
        assert!(step.is_valid);
    }

    #[test]
    fn test_mean_and_spread() {
        let mut acc = StepAccumulator::new();
        for angle in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.push(angle);
        }
        assert_eq!(acc.average(), 5.0);
        assert!((acc.std_dev() - 2.0).abs() < 1e-12);

        let step = acc.finish(3, 0, &StepValidator::new(Some(1.0)));
        assert_eq!(step.min_angle, 2.0);
        assert_eq!(step.max_angle, 9.0);
        assert!(!step.is_valid);
    }

    #[test]
    fn test_empty_window_guarded() {
        let acc = StepAccumulator::new();
        assert_eq!(acc.average(), 0.0);
        let step = acc.finish(1, 0, &StepValidator::permissive());
        assert_eq!(step.sample_count, 0);
        assert!(!step.is_valid);
    }

    #[test]
    fn test_step_serializes() {
        let mut acc = StepAccumulator::new();
        acc.push(-12.0);
        let step = acc.finish(2, 42, &StepValidator::permissive());
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step_index"], 2);
        assert_eq!(json["average_angle"], -12.0);
        assert_eq!(json["is_valid"], true);
    }
}
