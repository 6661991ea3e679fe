mod actuator;
mod broadcaster;
mod sampler;
mod service;
mod session;
mod shutdown;
mod transport;
mod wake;

pub use actuator::{ActuatorWorker, ProcessError, WorkerStats};
pub use broadcaster::{Broadcaster, BroadcasterStats};
pub use sampler::{CycleOutcome, DropReason, Sampler, SamplerStats};
pub use service::{Service, ServiceConfig, ServiceReport, StartupError};
pub use session::{Session, SessionRegistry};
pub use shutdown::Shutdown;
pub use transport::{LoopEvent, SessionId, Transport};
pub use wake::{LoopWaker, WakeSignal};
