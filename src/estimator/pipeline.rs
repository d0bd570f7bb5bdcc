// Per-sample chain used by both the calibration slot and the live readout:
// smooth raw sample -> convert to angles -> smooth angles

use super::angles::{accel_to_angles, AngleTriple, Sample};
use super::smoothing::SmoothingWindow;
use crate::config::SensorConfig;

/// Output of one pipeline step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOutput {
    /// Smoothed acceleration
    pub sample: Sample,
    /// Angles of the smoothed acceleration, smoothed again
    pub angles: AngleTriple,
}

/// Stateful estimator owning its two smoothing windows
#[derive(Debug, Clone)]
pub struct AnglePipeline {
    samples: SmoothingWindow<Sample>,
    angles: SmoothingWindow<AngleTriple>,
}

impl AnglePipeline {
    pub fn new(sample_window: usize, angle_window: usize) -> Self {
        Self {
            samples: SmoothingWindow::new(sample_window),
            angles: SmoothingWindow::new(angle_window),
        }
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        Self::new(config.sample_window, config.angle_window)
    }

    pub fn process(&mut self, sample: Sample) -> PipelineOutput {
        let smoothed = self.samples.push(sample);
        let angles = self.angles.push(accel_to_angles(&smoothed));
        PipelineOutput {
            sample: smoothed,
            angles,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.angles.clear();
    }
}

impl Default for AnglePipeline {
    fn default() -> Self {
        Self::from_config(&SensorConfig::default())
    }
}
