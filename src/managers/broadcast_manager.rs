// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::calibration::CalibrationEvent;
use crate::readout::LiveReading;

type Slot<T> = Arc<Mutex<Option<broadcast::Sender<T>>>>;

/// Manages all tokio broadcast channels
///
/// Single Responsibility: Broadcast channel lifecycle and subscription
///
/// # Channel Types
/// - Calibration: progress, completion, stop and failure events
/// - Readings: live smoothed sensor readings for the sensor screen
///
/// Subscribers that fall behind lose the oldest messages (`Lagged`); the
/// publisher never blocks.
pub struct BroadcastChannelManager {
    calibration: Slot<CalibrationEvent>,
    readings: Slot<LiveReading>,
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    ///
    /// Channels must be explicitly initialized via init_* methods before use.
    pub fn new() -> Self {
        Self {
            calibration: Arc::new(Mutex::new(None)),
            readings: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // CALIBRATION CHANNEL
    // ========================================================================

    /// Initialize calibration broadcast channel
    ///
    /// Returns sender for the calibration manager to publish events.
    ///
    /// # Notes
    /// - A 5-step run at the default 50 ms poll emits roughly 520 events
    /// - Calling again replaces the channel; old receivers see it close
    pub fn init_calibration(&self, capacity: usize) -> broadcast::Sender<CalibrationEvent> {
        init(&self.calibration, capacity)
    }

    /// Subscribe to calibration events
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<CalibrationEvent>>` - Receiver or None if not initialized
    pub fn subscribe_calibration(&self) -> Option<broadcast::Receiver<CalibrationEvent>> {
        subscribe(&self.calibration)
    }

    // ========================================================================
    // LIVE READINGS CHANNEL
    // ========================================================================

    /// Initialize live readings broadcast channel
    pub fn init_readings(&self, capacity: usize) -> broadcast::Sender<LiveReading> {
        init(&self.readings, capacity)
    }

    /// Subscribe to live readings
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<LiveReading>>` - Receiver or None if not initialized
    pub fn subscribe_readings(&self) -> Option<broadcast::Receiver<LiveReading>> {
        subscribe(&self.readings)
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

fn init<T: Clone>(slot: &Mutex<Option<broadcast::Sender<T>>>, capacity: usize) -> broadcast::Sender<T> {
    let (tx, _) = broadcast::channel(capacity.max(1));
    let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(tx.clone());
    tx
}

fn subscribe<T: Clone>(slot: &Mutex<Option<broadcast::Sender<T>>>) -> Option<broadcast::Receiver<T>> {
    slot.lock().ok()?.as_ref().map(|tx| tx.subscribe())
}
