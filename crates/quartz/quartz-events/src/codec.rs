//! Wire encoding for outbound readings and inbound commands.
//!
//! The layout is fixed by the browser client:
//!
//! ```text
//! reading → {"temp":{"value":"21.500","isActive":"1"},
//!            "humm":{"value":"40.125","isActive":"1"},
//!            "light":{"value":"1234","isActive":"0"},
//!            "proximity":{"value":"17","isActive":"1"}}
//!
//! command ← {"led":"on"} | {"led":"off"}
//! ```
//!
//! Values and flags are JSON strings, not numbers.

use crate::command::{ActuatorTarget, Command, SwitchState};
use crate::reading::{Field, Reading};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to serialize reading")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("command payload is not a JSON object")]
    NotAnObject,
    #[error("malformed command payload")]
    Malformed(#[from] serde_json::Error),
    #[error("command has no \"led\" key with a string value")]
    MissingAction,
    #[error("unknown value {0:?} for the \"led\" key")]
    UnknownAction(String),
}

#[derive(Serialize)]
struct WireField {
    value: String,
    #[serde(rename = "isActive")]
    is_active: &'static str,
}

impl WireField {
    fn decimal(f: Field<f32>) -> Self {
        Self::with(format!("{:.3}", f.value), f.active)
    }

    fn integer(f: Field<u32>) -> Self {
        Self::with(f.value.to_string(), f.active)
    }

    fn with(value: String, active: bool) -> Self {
        Self {
            value,
            is_active: if active { "1" } else { "0" },
        }
    }
}

#[derive(Serialize)]
struct WireReading {
    temp: WireField,
    humm: WireField,
    light: WireField,
    proximity: WireField,
}

#[derive(Deserialize)]
struct WireCommand {
    #[serde(default)]
    led: Option<String>,
}

pub fn encode_reading(reading: &Reading) -> Result<Vec<u8>, EncodeError> {
    let wire = WireReading {
        temp: WireField::decimal(reading.temperature),
        humm: WireField::decimal(reading.humidity),
        light: WireField::integer(reading.light),
        proximity: WireField::integer(reading.proximity),
    };
    Ok(serde_json::to_vec(&wire)?)
}

/// Decodes an inbound command payload.
///
/// Anything other than an object whose `"led"` key holds `"on"` or `"off"` is
/// rejected; unrelated keys are ignored.
pub fn decode_command(payload: &[u8]) -> Result<Command, DecodeError> {
    // serde would also accept a JSON array for a struct; only objects are commands.
    let first = payload.iter().find(|b| !b.is_ascii_whitespace());
    if first != Some(&b'{') {
        return Err(DecodeError::NotAnObject);
    }
    let wire: WireCommand = serde_json::from_slice(payload)?;
    let action = wire.led.ok_or(DecodeError::MissingAction)?;
    match SwitchState::from_wire(&action) {
        Some(state) => Ok(Command {
            target: ActuatorTarget::Led,
            state,
        }),
        None => Err(DecodeError::UnknownAction(action)),
    }
}
