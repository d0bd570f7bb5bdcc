// Progress tracking for calibration workflow
//
// This module provides the event types published while a session runs and
// the status strings shown to the user.

use serde::{Deserialize, Serialize};

use super::step::CalibrationStep;

/// Progress information for the current calibration step
///
/// Emitted when a step starts, after every poll of the angle slot, and when
/// a step is captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    /// 1-based step being captured
    pub current_step: usize,
    /// Steps in the run
    pub total_steps: usize,
    /// Instantaneous angle from the latest poll, if this update carries one
    pub current_angle: Option<f64>,
    /// True while the capture window is open
    pub is_validating: bool,
    /// Human-readable status line
    pub validation_message: String,
}

impl CalibrationProgress {
    /// Capture window for `step` opened
    pub fn capture_started(step: usize, total_steps: usize, capture_duration_ms: u64) -> Self {
        Self {
            current_step: step,
            total_steps,
            current_angle: None,
            is_validating: true,
            validation_message: format!(
                "Capturing foot angle {}/{}... Walk normally for {} seconds",
                step,
                total_steps,
                format_seconds(capture_duration_ms)
            ),
        }
    }

    /// One poll inside an open window
    pub fn reading(step: usize, total_steps: usize, angle: f64) -> Self {
        Self {
            current_step: step,
            total_steps,
            current_angle: Some(angle),
            is_validating: true,
            validation_message: format!("Capturing foot angle... Current: {:.2}°", angle),
        }
    }

    /// Window closed and the step recorded
    pub fn step_captured(step: &CalibrationStep, total_steps: usize) -> Self {
        let mut message = format!(
            "Foot angle {} captured: {:.1}°",
            step.step_index, step.average_angle
        );
        if !step.is_valid {
            message.push_str(&format!(" (unsteady, ±{:.1}°)", step.std_dev));
        }

        Self {
            current_step: step.step_index,
            total_steps,
            current_angle: None,
            is_validating: false,
            validation_message: message,
        }
    }

    /// Get progress percentage (0-100) by step position
    pub fn percentage(&self) -> u8 {
        if self.total_steps == 0 {
            return 0;
        }
        ((self.current_step.min(self.total_steps) as f32 / self.total_steps as f32) * 100.0) as u8
    }
}

/// Event published on the calibration channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CalibrationEvent {
    Progress(CalibrationProgress),
    /// Every step captured; carries the ordered results
    Completed(Vec<CalibrationStep>),
    /// Stop requested before the last step finished
    Stopped { steps_captured: usize },
    /// Run aborted by an error
    Failed { code: i32, message: String },
}

/// How a run ended without an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "steps", rename_all = "snake_case")]
pub enum CalibrationOutcome {
    Completed(Vec<CalibrationStep>),
    Stopped(Vec<CalibrationStep>),
}

impl CalibrationOutcome {
    pub fn steps(&self) -> &[CalibrationStep] {
        match self {
            CalibrationOutcome::Completed(steps) | CalibrationOutcome::Stopped(steps) => steps,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CalibrationOutcome::Completed(_))
    }
}

fn format_seconds(ms: u64) -> String {
    if ms % 1000 == 0 {
        (ms / 1000).to_string()
    } else {
        format!("{:.1}", ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, angle: f64, valid: bool) -> CalibrationStep {
        CalibrationStep {
            step_index: index,
            average_angle: angle,
            captured_at_ms: 0,
            sample_count: 100,
            std_dev: if valid { 0.5 } else { 31.0 },
            min_angle: angle,
            max_angle: angle,
            is_valid: valid,
        }
    }

    #[test]
    fn test_capture_started_message() {
        let progress = CalibrationProgress::capture_started(2, 5, 5000);
        assert_eq!(
            progress.validation_message,
            "Capturing foot angle 2/5... Walk normally for 5 seconds"
        );
        assert!(progress.is_validating);
        assert!(progress.current_angle.is_none());

        let progress = CalibrationProgress::capture_started(1, 5, 1500);
        assert!(progress.validation_message.ends_with("for 1.5 seconds"));
    }

    #[test]
    fn test_reading_message() {
        let progress = CalibrationProgress::reading(1, 5, 12.3456);
        assert_eq!(
            progress.validation_message,
            "Capturing foot angle... Current: 12.35°"
        );
        assert_eq!(progress.current_angle, Some(12.3456));
    }

    #[test]
    fn test_step_captured_message() {
        let progress = CalibrationProgress::step_captured(&step(3, 37.5, true), 5);
        assert_eq!(progress.validation_message, "Foot angle 3 captured: 37.5°");
        assert!(!progress.is_validating);
        assert_eq!(progress.current_step, 3);

        let progress = CalibrationProgress::step_captured(&step(4, 10.0, false), 5);
        assert!(progress.validation_message.contains("unsteady"));
    }

    #[test]
    fn test_percentage() {
        assert_eq!(CalibrationProgress::reading(1, 5, 0.0).percentage(), 20);
        assert_eq!(CalibrationProgress::reading(5, 5, 0.0).percentage(), 100);
        assert_eq!(CalibrationProgress::reading(0, 0, 0.0).percentage(), 0);
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = CalibrationOutcome::Stopped(vec![step(1, 1.0, true)]);
        assert!(!outcome.is_completed());
        assert_eq!(outcome.steps().len(), 1);
    }

    #[test]
    fn test_event_serialization_tag() {
        let json = serde_json::to_value(CalibrationEvent::Stopped { steps_captured: 2 }).unwrap();
        assert_eq!(json["type"], "stopped");
        assert_eq!(json["payload"]["steps_captured"], 2);
    }
}
