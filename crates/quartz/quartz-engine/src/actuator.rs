use crate::shutdown::Shutdown;
use quartz_events::{Actuator, ActuatorError, Command, DecodeError, decode_command};
use quartz_ring::{CommandRing, Message};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub applied: u64,
    /// Payloads that did not decode to a command.
    pub rejected: u64,
    /// Decoded commands the actuator failed to apply.
    pub failed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("rejected command")]
    Decode(#[from] DecodeError),
    #[error("actuator failed")]
    Apply(#[from] ActuatorError),
}

/// Consumer thread: drains the command ring into the actuator, one command at
/// a time.
pub struct ActuatorWorker<A> {
    actuator: A,
    commands: Arc<CommandRing<Message>>,
    stats: WorkerStats,
}

impl<A: Actuator> ActuatorWorker<A> {
    pub fn new(actuator: A, commands: Arc<CommandRing<Message>>) -> Self {
        Self {
            actuator,
            commands,
            stats: WorkerStats::default(),
        }
    }

    /// Blocks on the command ring until shutdown. Commands already queued when
    /// shutdown fires are still applied.
    pub fn run(&mut self, shutdown: &Shutdown) -> WorkerStats {
        info!("actuator worker started");
        while let Some(msg) = self.commands.pop_blocking(shutdown.flag()) {
            match self.process(&msg) {
                Ok(command) => info!(%command, "command applied"),
                Err(ProcessError::Decode(error)) => {
                    warn!(%error, payload = ?msg, "discarding malformed command")
                }
                Err(ProcessError::Apply(error)) => error!(%error, "actuator command failed"),
            }
        }
        info!(
            applied = self.stats.applied,
            rejected = self.stats.rejected,
            failed = self.stats.failed,
            "actuator worker stopped"
        );
        self.stats
    }

    /// Decodes one payload and applies it.
    pub fn process(&mut self, msg: &Message) -> Result<Command, ProcessError> {
        let command = decode_command(msg.payload()).inspect_err(|_| self.stats.rejected += 1)?;
        debug!(%command, "command decoded");
        self.actuator
            .apply(command)
            .inspect_err(|_| self.stats.failed += 1)?;
        self.stats.applied += 1;
        Ok(command)
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }
}
