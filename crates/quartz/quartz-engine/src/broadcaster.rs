//! Event-loop side of the service.
//!
//! The broadcaster owns the [`SessionRegistry`] and turns transport events into
//! ring operations. Every handler is non-blocking: ring calls are O(1) under a
//! short-held mutex and transport writes only queue bytes.
//!
//! Delivery is one message per writable turn. When a session still has data
//! after a write, another writable turn is requested instead of looping, so a
//! backlogged subscriber cannot starve the others sharing the loop.

use crate::session::SessionRegistry;
use crate::transport::{LoopEvent, SessionId, Transport};
use quartz_ring::{BroadcastRing, CommandRing, Message};
use std::io;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcasterStats {
    pub delivered: u64,
    /// Writes the transport asked to retry later.
    pub deferred: u64,
    pub commands_queued: u64,
    pub commands_dropped: u64,
    pub write_errors: u64,
}

pub struct Broadcaster {
    ring: Arc<BroadcastRing<Message>>,
    commands: Arc<CommandRing<Message>>,
    sessions: SessionRegistry,
    stats: BroadcasterStats,
}

enum WriteOutcome {
    Sent,
    Busy,
    Failed(io::Error),
}

impl Broadcaster {
    pub fn new(ring: Arc<BroadcastRing<Message>>, commands: Arc<CommandRing<Message>>) -> Self {
        Self {
            ring,
            commands,
            sessions: SessionRegistry::new(),
            stats: BroadcasterStats::default(),
        }
    }

    pub fn handle<T: Transport>(&mut self, transport: &mut T, event: LoopEvent<'_>) {
        match event {
            LoopEvent::Connected(id) => {
                self.on_connect(id);
                if self.sessions.get(id).is_some_and(|s| self.ring.has_pending(s.cursor)) {
                    transport.request_writable(id);
                }
            }
            LoopEvent::Disconnected(id) => self.on_disconnect(id),
            LoopEvent::Received(id, bytes) => self.on_receive(id, bytes),
            LoopEvent::Writable(id) => self.on_writable(transport, id),
            LoopEvent::Wake => self.on_wake(transport),
        }
    }

    /// Registers a ring cursor for the new session at the current oldest tail,
    /// so it starts with the retained backlog.
    pub fn on_connect(&mut self, id: SessionId) {
        let cursor = self.ring.register_consumer();
        if let Some(stale) = self.sessions.insert(id, cursor) {
            // Transport reused an id without a disconnect in between.
            self.ring.unregister_consumer(stale.cursor);
        }
        info!(session = %id, backlog = self.ring.len(), "subscriber connected");
    }

    /// Drops the session's cursor, which may advance the oldest tail and free
    /// slots. Unknown ids are ignored.
    pub fn on_disconnect(&mut self, id: SessionId) {
        let Some(session) = self.sessions.remove(id) else {
            return;
        };
        self.ring.unregister_consumer(session.cursor);
        info!(
            session = %id,
            delivered = session.delivered,
            "subscriber disconnected"
        );
    }

    /// New data was published: every live session gets a writable turn.
    pub fn on_wake<T: Transport>(&mut self, transport: &mut T) {
        for id in self.sessions.ids() {
            trace!(session = %id, "writable requested");
            transport.request_writable(id);
        }
    }

    /// Sends at most one message to `id`.
    pub fn on_writable<T: Transport>(&mut self, transport: &mut T, id: SessionId) {
        let Some(session) = self.sessions.get(id) else {
            return;
        };
        let cursor = session.cursor;

        let outcome = self.ring.peek_with(cursor, |msg| {
            match transport.write(id, msg.payload()) {
                Ok(n) if n == msg.len() => WriteOutcome::Sent,
                Ok(0) => WriteOutcome::Busy,
                Ok(n) => WriteOutcome::Failed(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("partial write: {n} of {} bytes", msg.len()),
                )),
                Err(err) => WriteOutcome::Failed(err),
            }
        });

        match outcome {
            // Caught up.
            None => {}
            Some(WriteOutcome::Sent) => {
                self.ring.consume_and_update(cursor);
                self.stats.delivered += 1;
                if let Some(session) = self.sessions.get_mut(id) {
                    session.delivered += 1;
                }
                if self.ring.has_pending(cursor) {
                    transport.request_writable(id);
                }
            }
            Some(WriteOutcome::Busy) => {
                self.stats.deferred += 1;
                transport.request_writable(id);
            }
            Some(WriteOutcome::Failed(err)) => {
                self.stats.write_errors += 1;
                error!(session = %id, error = %err, "write failed, closing session");
                transport.close(id);
                self.on_disconnect(id);
            }
        }
    }

    /// Queues an inbound payload for the actuator worker, dropping it if the
    /// command ring is full.
    pub fn on_receive(&mut self, id: SessionId, bytes: &[u8]) {
        debug!(session = %id, len = bytes.len(), "command received");
        match self.commands.enqueue(Message::from(bytes)) {
            Ok(()) => self.stats.commands_queued += 1,
            Err(_) => {
                self.stats.commands_dropped += 1;
                warn!(
                    session = %id,
                    capacity = self.commands.capacity(),
                    "command ring full, dropping command"
                );
            }
        }
    }

    /// Closes every session, releasing all ring cursors.
    pub fn disconnect_all<T: Transport>(&mut self, transport: &mut T) {
        for id in self.sessions.ids() {
            transport.close(id);
            self.on_disconnect(id);
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn stats(&self) -> BroadcasterStats {
        self.stats
    }

    pub fn ring(&self) -> &Arc<BroadcastRing<Message>> {
        &self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartz_ring::RingConfig;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Recorder {
        writable: Vec<SessionId>,
        written: HashMap<SessionId, Vec<Vec<u8>>>,
        closed: Vec<SessionId>,
        busy: bool,
        fail: bool,
    }

    impl Transport for Recorder {
        fn request_writable(&mut self, session: SessionId) {
            self.writable.push(session);
        }

        fn write(&mut self, session: SessionId, payload: &[u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            if self.busy {
                return Ok(0);
            }
            self.written
                .entry(session)
                .or_default()
                .push(payload.to_vec());
            Ok(payload.len())
        }

        fn close(&mut self, session: SessionId) {
            self.closed.push(session);
        }
    }

    fn broadcaster(cap: usize) -> Broadcaster {
        Broadcaster::new(
            Arc::new(BroadcastRing::new(RingConfig::new(cap))),
            Arc::new(CommandRing::new(RingConfig::new(cap))),
        )
    }

    #[test]
    fn wake_requests_writable_for_every_session() {
        let mut b = broadcaster(4);
        let mut t = Recorder::default();
        b.on_connect(SessionId(1));
        b.on_connect(SessionId(2));
        b.on_wake(&mut t);
        assert_eq!(t.writable, vec![SessionId(1), SessionId(2)]);
    }

    #[test]
    fn one_message_per_writable_then_rerequest() {
        let mut b = broadcaster(4);
        let mut t = Recorder::default();
        let id = SessionId(7);
        b.on_connect(id);
        b.ring().try_insert(Message::from("a")).unwrap();
        b.ring().try_insert(Message::from("b")).unwrap();

        b.on_writable(&mut t, id);
        assert_eq!(t.written[&id], vec![b"a".to_vec()]);
        assert_eq!(t.writable, vec![id]);

        b.on_writable(&mut t, id);
        assert_eq!(t.written[&id].len(), 2);
        // Caught up: no further request.
        assert_eq!(t.writable, vec![id]);
        assert_eq!(b.ring().free_slots(), 4);
    }

    #[test]
    fn busy_transport_keeps_cursor() {
        let mut b = broadcaster(4);
        let mut t = Recorder {
            busy: true,
            ..Recorder::default()
        };
        let id = SessionId(1);
        b.on_connect(id);
        b.ring().try_insert(Message::from("x")).unwrap();
        b.on_writable(&mut t, id);
        assert_eq!(b.ring().len(), 1);
        assert_eq!(b.stats().deferred, 1);
        assert_eq!(t.writable, vec![id]);

        t.busy = false;
        b.on_writable(&mut t, id);
        assert_eq!(b.ring().len(), 0);
    }

    #[test]
    fn write_error_closes_and_releases_cursor() {
        let mut b = broadcaster(2);
        let mut t = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let id = SessionId(3);
        b.on_connect(id);
        b.ring().try_insert(Message::from("x")).unwrap();
        b.on_writable(&mut t, id);
        assert_eq!(t.closed, vec![id]);
        assert!(b.sessions().is_empty());
        assert_eq!(b.ring().consumer_count(), 0);
        assert_eq!(b.stats().write_errors, 1);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut b = broadcaster(2);
        b.on_connect(SessionId(1));
        b.on_disconnect(SessionId(1));
        b.on_disconnect(SessionId(1));
        assert_eq!(b.ring().consumer_count(), 0);
    }

    #[test]
    fn receive_enqueues_until_full() {
        let mut b = broadcaster(2);
        for _ in 0..3 {
            b.on_receive(SessionId(1), br#"{"led":"on"}"#);
        }
        let stats = b.stats();
        assert_eq!(stats.commands_queued, 2);
        assert_eq!(stats.commands_dropped, 1);
        assert!(b.commands.is_full());
    }

    #[test]
    fn writable_for_unknown_session_is_ignored() {
        let mut b = broadcaster(2);
        let mut t = Recorder::default();
        b.on_writable(&mut t, SessionId(9));
        assert!(t.written.is_empty());
    }
}
