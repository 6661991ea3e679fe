use std::fmt;

/// Which actuator a command addresses. The board exposes a single LED bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActuatorTarget {
    Led,
}

impl ActuatorTarget {
    /// Key used for this target in the command payload.
    pub fn wire_key(self) -> &'static str {
        match self {
            ActuatorTarget::Led => "led",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "on" => Some(SwitchState::On),
            "off" => Some(SwitchState::Off),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            SwitchState::On => "on",
            SwitchState::Off => "off",
        }
    }
}

/// A decoded actuator instruction. Ephemeral: built from a received payload,
/// applied once, then dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    pub target: ActuatorTarget,
    pub state: SwitchState,
}

impl Command {
    pub fn led(state: SwitchState) -> Self {
        Self {
            target: ActuatorTarget::Led,
            state,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.target.wire_key(), self.state.as_wire())
    }
}
