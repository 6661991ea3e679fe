#![allow(dead_code)]

use quartz_engine::{Broadcaster, LoopEvent, LoopWaker, SessionId, Transport};
use quartz_events::{Climate, SensorError, SensorSource};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory transport that records traffic and replays writable requests.
#[derive(Default)]
pub struct LoopbackTransport {
    pub pending: VecDeque<SessionId>,
    pub received: HashMap<SessionId, Vec<String>>,
    pub closed: Vec<SessionId>,
}

impl LoopbackTransport {
    /// Delivers queued writable turns until none remain.
    pub fn pump(&mut self, broadcaster: &mut Broadcaster) {
        while let Some(id) = self.pending.pop_front() {
            broadcaster.handle(self, LoopEvent::Writable(id));
        }
    }

    pub fn messages(&self, id: SessionId) -> Vec<String> {
        self.received.get(&id).cloned().unwrap_or_default()
    }
}

impl Transport for LoopbackTransport {
    fn request_writable(&mut self, session: SessionId) {
        self.pending.push_back(session);
    }

    fn write(&mut self, session: SessionId, payload: &[u8]) -> io::Result<usize> {
        self.received
            .entry(session)
            .or_default()
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(payload.len())
    }

    fn close(&mut self, session: SessionId) {
        self.closed.push(session);
    }
}

#[derive(Default)]
pub struct CountingWaker(pub AtomicUsize);

impl CountingWaker {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

impl LoopWaker for CountingWaker {
    fn wake(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Sensor source that counts calls and can fail its light channel.
#[derive(Default)]
pub struct CountingSensors {
    pub calls: usize,
    pub light_fails: bool,
}

impl SensorSource for CountingSensors {
    fn read_climate(&mut self) -> Result<Climate, SensorError> {
        self.calls += 1;
        Ok(Climate {
            temperature_c: self.calls as f32,
            humidity_pct: 50.0,
        })
    }

    fn read_light(&mut self) -> Result<u32, SensorError> {
        if self.light_fails {
            Err(SensorError::Injected("light"))
        } else {
            Ok(300)
        }
    }

    fn read_proximity(&mut self) -> Result<u32, SensorError> {
        Ok(12)
    }
}
