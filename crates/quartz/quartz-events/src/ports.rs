//! Collaborator ports: the hardware the engine samples and drives.
//!
//! Implementations live in `quartz-sensors`; the engine only sees these traits.

use crate::command::{ActuatorTarget, Command};
use crate::reading::Climate;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("bus transfer failed")]
    Bus(#[from] std::io::Error),
    #[error("sensor returned stale data")]
    Stale,
    #[error("sensor access is not supported on this platform")]
    Unsupported,
    #[error("injected failure: {0}")]
    Injected(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("failed to drive {pin}")]
    Io {
        pin: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0:?} is not wired on this board")]
    Unsupported(ActuatorTarget),
    #[error("injected failure")]
    Injected,
}

/// Three independently fallible reads, one per physical sensor channel.
pub trait SensorSource: Send {
    /// Temperature and humidity come from one measurement.
    fn read_climate(&mut self) -> Result<Climate, SensorError>;
    fn read_light(&mut self) -> Result<u32, SensorError>;
    fn read_proximity(&mut self) -> Result<u32, SensorError>;
}

pub trait Actuator: Send {
    fn apply(&mut self, command: Command) -> Result<(), ActuatorError>;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn read_climate(&mut self) -> Result<Climate, SensorError> {
        (**self).read_climate()
    }

    fn read_light(&mut self) -> Result<u32, SensorError> {
        (**self).read_light()
    }

    fn read_proximity(&mut self) -> Result<u32, SensorError> {
        (**self).read_proximity()
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn apply(&mut self, command: Command) -> Result<(), ActuatorError> {
        (**self).apply(command)
    }
}
