//! PMOD LED bank driven through the sysfs GPIO interface.

use quartz_config::{LedConfig, LedPin};
use quartz_events::{Actuator, ActuatorError, ActuatorTarget, Command, SwitchState};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Time for udev to hand exported pin directories to userspace.
const EXPORT_SETTLE: Duration = Duration::from_secs(1);

pub struct PmodLed {
    root: PathBuf,
    pins: Vec<LedPin>,
    settle: Duration,
}

impl PmodLed {
    pub fn new(config: &LedConfig) -> Self {
        Self {
            root: PathBuf::from(&config.sysfs_root),
            pins: config.pins.clone(),
            settle: EXPORT_SETTLE,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Exports any pin the kernel has not exposed yet, then drives every pin low.
    pub fn prepare(&mut self) -> Result<(), ActuatorError> {
        let mut exported = false;
        for pin in &self.pins {
            if self.root.join(&pin.name).exists() {
                continue;
            }
            let export = self.root.join("export");
            fs::write(&export, pin.gpio.to_string()).map_err(|source| ActuatorError::Io {
                pin: pin.name.clone(),
                source,
            })?;
            debug!(gpio = pin.gpio, name = %pin.name, "exported gpio");
            exported = true;
        }
        if exported && !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
        self.set(SwitchState::Off)?;
        info!(pins = self.pins.len(), "led bank ready");
        Ok(())
    }

    pub fn set(&mut self, state: SwitchState) -> Result<(), ActuatorError> {
        let level = match state {
            SwitchState::On => "high",
            SwitchState::Off => "low",
        };
        for pin in &self.pins {
            let direction = self.root.join(&pin.name).join("direction");
            fs::write(&direction, level).map_err(|source| ActuatorError::Io {
                pin: pin.name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl Actuator for PmodLed {
    fn apply(&mut self, command: Command) -> Result<(), ActuatorError> {
        match command.target {
            ActuatorTarget::Led => self.set(command.state),
        }
    }
}
