pub mod codec;
pub mod command;
pub mod ports;
pub mod reading;

pub use codec::{DecodeError, EncodeError, decode_command, encode_reading};
pub use command::{ActuatorTarget, Command, SwitchState};
pub use ports::{Actuator, ActuatorError, SensorError, SensorSource};
pub use reading::{Climate, Field, Reading};
