// Managers Module
//
// Focused manager classes extracted from AppContext to apply Single Responsibility Principle.
//
// Each manager handles one specific concern:
// - CalibrationManager: Calibration workflow, sensor listener and results
// - BroadcastChannelManager: Tokio broadcast channel management

pub mod broadcast_manager;
pub mod calibration_manager;

pub use broadcast_manager::BroadcastChannelManager;
pub use calibration_manager::CalibrationManager;
