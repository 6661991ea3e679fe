//! Hardware-free stand-ins used with `backend = "simulated"` and in tests.

use quartz_events::{Actuator, ActuatorError, Climate, Command, SensorError, SensorSource};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Every `n`th read of a channel fails. `None` never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailurePlan {
    pub climate: Option<u64>,
    pub light: Option<u64>,
    pub proximity: Option<u64>,
}

/// Deterministic readings that drift slowly with each climate read.
#[derive(Debug, Default)]
pub struct SimulatedBoard {
    tick: u64,
    plan: FailurePlan,
}

impl SimulatedBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failures(plan: FailurePlan) -> Self {
        Self { tick: 0, plan }
    }

    fn should_fail(every: Option<u64>, tick: u64) -> bool {
        matches!(every, Some(n) if n > 0 && tick % n == 0)
    }
}

impl SensorSource for SimulatedBoard {
    fn read_climate(&mut self) -> Result<Climate, SensorError> {
        self.tick += 1;
        if Self::should_fail(self.plan.climate, self.tick) {
            return Err(SensorError::Injected("climate"));
        }
        let phase = (self.tick % 40) as f32;
        Ok(Climate {
            temperature_c: 21.0 + phase * 0.125,
            humidity_pct: 40.0 + (40.0 - phase) * 0.25,
        })
    }

    fn read_light(&mut self) -> Result<u32, SensorError> {
        if Self::should_fail(self.plan.light, self.tick) {
            return Err(SensorError::Injected("light"));
        }
        Ok(200 + (self.tick * 37 % 400) as u32)
    }

    fn read_proximity(&mut self) -> Result<u32, SensorError> {
        if Self::should_fail(self.plan.proximity, self.tick) {
            return Err(SensorError::Injected("proximity"));
        }
        Ok((self.tick * 13 % 2048) as u32)
    }
}

/// Logs commands instead of driving pins, and keeps a shared history.
#[derive(Debug, Default, Clone)]
pub struct SimulatedLed {
    history: Arc<Mutex<Vec<Command>>>,
}

impl SimulatedLed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every command applied so far, oldest first.
    pub fn history(&self) -> Vec<Command> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Actuator for SimulatedLed {
    fn apply(&mut self, command: Command) -> Result<(), ActuatorError> {
        info!(%command, "simulated led");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
        Ok(())
    }
}
