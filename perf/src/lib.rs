use quartz_engine::{Broadcaster, SessionId, Transport};
use quartz_events::{Field, Reading, encode_reading};
use quartz_ring::{BroadcastRing, CommandRing, Message, RingConfig};
use std::io;
use std::sync::Arc;

/// A plausible reading with the `i`th variation applied.
pub fn make_test_reading(i: u32) -> Reading {
    Reading {
        temperature: Field::active(21.5 + (i % 10) as f32 * 0.125),
        humidity: Field::active(40.0 + (i % 7) as f32),
        light: Field::active(1200 + i % 400),
        proximity: Field::inactive(i % 2048),
    }
}

/// The encoded form of [`make_test_reading`], as the sampler publishes it.
pub fn make_test_message(i: u32) -> Message {
    Message::from(encode_reading(&make_test_reading(i)).unwrap_or_default())
}

/// Inbound payloads in the proportions a browser client tends to send.
pub fn command_corpus() -> Vec<Vec<u8>> {
    [
        r#"{"led":"on"}"#,
        r#"{"led":"off"}"#,
        r#"{ "led" : "on", "seq": 17 }"#,
        r#"{"led":"blue"}"#,
        "{}",
        "not json",
    ]
    .iter()
    .map(|s| s.as_bytes().to_vec())
    .collect()
}

pub fn broadcast_ring(capacity: usize) -> Arc<BroadcastRing<Message>> {
    Arc::new(BroadcastRing::new(RingConfig::new(capacity)))
}

pub fn command_ring(capacity: usize) -> Arc<CommandRing<Message>> {
    Arc::new(CommandRing::new(RingConfig::new(capacity)))
}

/// Transport that accepts every write and discards it.
#[derive(Default)]
pub struct SinkTransport {
    pub requested: Vec<SessionId>,
    pub bytes: u64,
}

impl Transport for SinkTransport {
    fn request_writable(&mut self, session: SessionId) {
        self.requested.push(session);
    }

    fn write(&mut self, _session: SessionId, payload: &[u8]) -> io::Result<usize> {
        self.bytes += payload.len() as u64;
        Ok(payload.len())
    }

    fn close(&mut self, _session: SessionId) {}
}

/// A broadcaster with `sessions` connected subscribers.
pub fn broadcaster_with_sessions(capacity: usize, sessions: u64) -> Broadcaster {
    let mut b = Broadcaster::new(broadcast_ring(capacity), command_ring(capacity));
    for id in 0..sessions {
        b.on_connect(SessionId(id));
    }
    b
}
