// Sensor boundary - platform capability, latest-angle slot, simulated source

pub mod simulated;
pub mod slot;
pub mod source;

pub use simulated::{gravity_at_roll, SimulatedMotion, SimulatedSensor};
pub use slot::{AngleSlot, AngleSource};
pub use source::{
    RawSample, SampleHandler, SensorEvent, SensorKind, SensorSource, SensorSubscription,
    SubscriptionId,
};
