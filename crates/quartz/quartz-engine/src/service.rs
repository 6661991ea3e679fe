//! Service lifecycle: builds both rings, spawns the sampler and actuator
//! threads, and joins them on shutdown.

use crate::actuator::{ActuatorWorker, WorkerStats};
use crate::broadcaster::Broadcaster;
use crate::sampler::{Sampler, SamplerStats};
use crate::shutdown::Shutdown;
use crate::wake::LoopWaker;
use quartz_config::QuartzConfig;
use quartz_events::{Actuator, SensorSource};
use quartz_ring::{BroadcastRing, CommandRing, Message, RingConfig};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub sampling_interval: Duration,
    pub broadcast_capacity: usize,
    pub command_capacity: usize,
}

impl From<&QuartzConfig> for ServiceConfig {
    fn from(cfg: &QuartzConfig) -> Self {
        Self {
            sampling_interval: cfg.sampling_interval(),
            broadcast_capacity: cfg.broadcast_capacity,
            command_capacity: cfg.command_capacity,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&QuartzConfig::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to spawn thread")]
    Spawn(#[source] std::io::Error),
    #[error("hardware unavailable: {0}")]
    Hardware(String),
}

/// Final counters from both worker threads. `None` if a thread panicked.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceReport {
    pub sampler: Option<SamplerStats>,
    pub worker: Option<WorkerStats>,
}

pub struct Service {
    shutdown: Shutdown,
    commands: Arc<CommandRing<Message>>,
    sampler: Option<JoinHandle<SamplerStats>>,
    worker: Option<JoinHandle<WorkerStats>>,
}

impl Service {
    /// Spawns the sampler and actuator threads and returns the service handle
    /// together with the broadcaster the event loop drives.
    ///
    /// If the second spawn fails the first thread is stopped and joined before
    /// the error is returned.
    pub fn start<S, A>(
        cfg: ServiceConfig,
        source: S,
        actuator: A,
        waker: Arc<dyn LoopWaker>,
        shutdown: Shutdown,
    ) -> Result<(Service, Broadcaster), StartupError>
    where
        S: SensorSource + 'static,
        A: Actuator + 'static,
    {
        let ring = Arc::new(BroadcastRing::new(RingConfig::new(cfg.broadcast_capacity)));
        let commands = Arc::new(CommandRing::new(RingConfig::new(cfg.command_capacity)));

        let mut sampler = Sampler::new(source, Arc::clone(&ring), waker, cfg.sampling_interval);
        let sampler_shutdown = shutdown.clone();
        let sampler_handle = thread::Builder::new()
            .name("quartz-sampler".into())
            .spawn(move || sampler.run(&sampler_shutdown))
            .map_err(StartupError::Spawn)?;

        let mut service = Service {
            shutdown: shutdown.clone(),
            commands: Arc::clone(&commands),
            sampler: Some(sampler_handle),
            worker: None,
        };

        let mut worker = ActuatorWorker::new(actuator, Arc::clone(&commands));
        let worker_shutdown = shutdown;
        match thread::Builder::new()
            .name("quartz-actuator".into())
            .spawn(move || worker.run(&worker_shutdown))
        {
            Ok(handle) => service.worker = Some(handle),
            Err(err) => {
                service.stop();
                return Err(StartupError::Spawn(err));
            }
        }

        info!(
            interval_ms = cfg.sampling_interval.as_millis() as u64,
            broadcast_capacity = cfg.broadcast_capacity,
            command_capacity = cfg.command_capacity,
            "service started"
        );
        Ok((service, Broadcaster::new(ring, commands)))
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Raises the shutdown flag, unblocks the actuator worker, and joins both
    /// threads.
    pub fn shutdown(mut self) -> ServiceReport {
        self.stop()
    }

    fn stop(&mut self) -> ServiceReport {
        self.shutdown.trigger();
        self.commands.notify_consumer();

        let report = ServiceReport {
            sampler: join("sampler", self.sampler.take()),
            worker: join("actuator", self.worker.take()),
        };
        info!("service stopped");
        report
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        if self.sampler.is_some() || self.worker.is_some() {
            self.stop();
        }
    }
}

fn join<T>(name: &str, handle: Option<JoinHandle<T>>) -> Option<T> {
    let handle = handle?;
    match handle.join() {
        Ok(stats) => Some(stats),
        Err(_) => {
            error!(thread = name, "thread panicked");
            None
        }
    }
}
