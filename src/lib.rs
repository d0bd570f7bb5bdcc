// FES Calibration Core - foot angle estimation and calibration
// Accelerometer samples to smoothed tilt angles, timed multi-step capture

pub mod calibration;
pub mod config;
pub mod context;
pub mod error;
pub mod estimator;
pub mod managers;
pub mod readout;
pub mod sensor;

pub use calibration::{CalibrationEvent, CalibrationOutcome, CalibrationProgress, CalibrationStep};
pub use config::AppConfig;
pub use context::AppContext;
pub use error::{CalibrationError, ErrorCode, SensorError};

/// Install a stderr tracing subscriber
///
/// Also forwards `log` records. Returns false if a global subscriber was
/// already installed by the host.
pub fn init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
