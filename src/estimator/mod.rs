// Angle estimator - accelerometer samples to smoothed tilt angles
//
// 1. accel_to_angles: pure conversion of one sample to pitch/roll/yaw
// 2. smooth / SmoothingWindow: FIFO moving average over recent values
// 3. AnglePipeline: the two chained together with one window per stage

pub mod angles;
pub mod pipeline;
pub mod smoothing;

pub use angles::{accel_to_angles, AngleTriple, CaptureAxis, Sample};
pub use pipeline::{AnglePipeline, PipelineOutput};
pub use smoothing::{smooth, Componentwise, SmoothingWindow};
