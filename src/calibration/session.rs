// CalibrationSession - step list and run state for one calibration
//
// The session is the only owner of recorded steps. The procedure driver
// mutates it; everyone else reads snapshots through the derived queries.

use serde::{Deserialize, Serialize};

use super::step::CalibrationStep;
use crate::config::CalibrationConfig;
use crate::error::CalibrationError;

const MAX_PREALLOCATED_STEPS: usize = 16;

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running { step: usize },
    Completed,
    Cancelled,
    Failed,
}

/// Recorded steps plus the state machine around them
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    steps: Vec<CalibrationStep>,
    state: SessionState,
    total_steps: usize,
    min_valid_steps: usize,
}

impl CalibrationSession {
    pub fn new(config: &CalibrationConfig) -> Self {
        Self {
            steps: Vec::with_capacity(config.total_steps.min(MAX_PREALLOCATED_STEPS)),
            state: SessionState::Idle,
            total_steps: config.total_steps,
            min_valid_steps: config.min_valid_steps,
        }
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    /// Start a fresh run: clear results and enter `Running(1)`
    ///
    /// # Errors
    /// - `AlreadyInProgress` if a run has not finished yet
    pub fn begin(&mut self) -> Result<(), CalibrationError> {
        if self.is_running() {
            return Err(CalibrationError::AlreadyInProgress);
        }
        self.steps.clear();
        self.state = SessionState::Running { step: 1 };
        Ok(())
    }

    /// Move to the capture window of `step`
    pub fn advance_to(&mut self, step: usize) {
        if self.is_running() {
            self.state = SessionState::Running { step };
        }
    }

    /// Append a captured step
    ///
    /// # Errors
    /// - `StepOverflow` if `total_steps` are already recorded
    pub fn record_step(&mut self, step: CalibrationStep) -> Result<(), CalibrationError> {
        if self.steps.len() >= self.total_steps {
            return Err(CalibrationError::StepOverflow {
                total: self.total_steps,
            });
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn complete(&mut self) {
        self.state = SessionState::Completed;
    }

    pub fn cancel(&mut self) {
        self.state = SessionState::Cancelled;
    }

    pub fn fail(&mut self) {
        self.state = SessionState::Failed;
    }

    /// Back to `Idle` with no results
    pub fn reset(&mut self) {
        self.steps.clear();
        self.state = SessionState::Idle;
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }

    /// Step whose window is open, if running
    pub fn current_step_index(&self) -> Option<usize> {
        match self.state {
            SessionState::Running { step } => Some(step),
            _ => None,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn steps(&self) -> &[CalibrationStep] {
        &self.steps
    }

    pub fn valid_steps(&self) -> Vec<CalibrationStep> {
        self.steps.iter().filter(|s| s.is_valid).cloned().collect()
    }

    /// Mean of every recorded step average; 0 for no steps
    pub fn average_angle(&self) -> f64 {
        mean_angle(self.steps.iter())
    }

    /// Mean over valid steps only; 0 if none are valid
    pub fn average_valid_angle(&self) -> f64 {
        mean_angle(self.steps.iter().filter(|s| s.is_valid))
    }

    pub fn is_complete(&self) -> bool {
        self.steps.len() >= self.total_steps
    }

    pub fn has_enough_valid_steps(&self) -> bool {
        self.steps.iter().filter(|s| s.is_valid).count() >= self.min_valid_steps
    }
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new(&CalibrationConfig::default())
    }
}

fn mean_angle<'a>(steps: impl Iterator<Item = &'a CalibrationStep>) -> f64 {
    let (sum, count) = steps.fold((0.0, 0usize), |(sum, count), step| {
        (sum + step.average_angle, count + 1)
    });
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
