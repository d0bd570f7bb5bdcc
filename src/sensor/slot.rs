// Latest-value angle slot shared between the sensor handler and the capture loop
//
// Backed by a tokio watch channel: every write replaces the single stored
// value, reads never block. A fault written to the slot sticks until reset.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::SensorError;

/// Read side used by the capture loop
pub trait AngleSource {
    /// Latest known angle in degrees
    ///
    /// Fails only after the upstream sensor has faulted.
    fn read_angle(&self) -> Result<f64, SensorError>;
}

/// Single-value angle cell
#[derive(Clone)]
pub struct AngleSlot {
    tx: Arc<watch::Sender<Result<f64, SensorError>>>,
}

impl AngleSlot {
    pub fn new(initial: f64) -> Self {
        let (tx, _rx) = watch::channel(Ok(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Overwrite the stored angle; ignored while a fault is pending
    pub fn publish(&self, angle: f64) {
        self.tx.send_if_modified(|current| {
            if current.is_ok() {
                *current = Ok(angle);
                true
            } else {
                false
            }
        });
    }

    /// Record an upstream failure
    pub fn fault(&self, err: SensorError) {
        self.tx.send_replace(Err(err));
    }

    /// Clear a pending fault, keeping the last good angle (or 0)
    pub fn reset(&self) {
        self.tx.send_modify(|current| {
            if current.is_err() {
                *current = Ok(0.0);
            }
        });
    }

    /// Subscribe for change notifications
    pub fn watch(&self) -> watch::Receiver<Result<f64, SensorError>> {
        self.tx.subscribe()
    }
}

impl Default for AngleSlot {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl AngleSource for AngleSlot {
    fn read_angle(&self) -> Result<f64, SensorError> {
        self.tx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_value_wins() {
        let slot = AngleSlot::default();
        assert_eq!(slot.read_angle(), Ok(0.0));

        slot.publish(12.5);
        slot.publish(-3.25);
        assert_eq!(slot.read_angle(), Ok(-3.25));
    }

    #[test]
    fn test_clones_share_the_value() {
        let writer = AngleSlot::default();
        let reader = writer.clone();
        writer.publish(37.5);
        assert_eq!(reader.read_angle(), Ok(37.5));
    }

    #[test]
    fn test_fault_sticks_until_reset() {
        let slot = AngleSlot::new(5.0);
        slot.fault(SensorError::Fault {
            reason: "disconnected".to_string(),
        });
        slot.publish(10.0);
        assert!(slot.read_angle().is_err());

        slot.reset();
        assert_eq!(slot.read_angle(), Ok(0.0));
        slot.publish(10.0);
        assert_eq!(slot.read_angle(), Ok(10.0));
    }

    #[test]
    fn test_reset_keeps_good_value() {
        let slot = AngleSlot::new(4.0);
        slot.reset();
        assert_eq!(slot.read_angle(), Ok(4.0));
    }

    #[tokio::test]
    async fn test_watch_notifies_on_publish() {
        let slot = AngleSlot::default();
        let mut rx = slot.watch();
        slot.publish(1.0);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Ok(1.0));
    }
}
