// Calibration module - timed foot-angle capture workflow
//
// This module provides:
// 1. CalibrationSession: recorded steps and the run state machine
// 2. procedure: the capture loop that fills a session from an angle source
// 3. CalibrationProgress / CalibrationEvent: what the UI receives
//
// The calibration workflow:
// 1. Begin a session (clears previous results)
// 2. For each of N steps, average the live angle over a fixed window
// 3. Complete, or stop early if a stop was requested

pub mod procedure;
pub mod progress;
pub mod session;
pub mod step;
pub mod validation;

pub use procedure::{run_calibration, run_session};
pub use progress::{CalibrationEvent, CalibrationOutcome, CalibrationProgress};
pub use session::{CalibrationSession, SessionState};
pub use step::{CalibrationStep, StepAccumulator};
pub use validation::StepValidator;
