//! The event loop's view of the network.

use std::fmt;
use std::io;

/// Identifier the transport assigns to one subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Operations the broadcaster may invoke on the transport from inside the
/// event loop. None of them may block.
pub trait Transport {
    /// Asks for one [`LoopEvent::Writable`] for `session` on a later turn.
    fn request_writable(&mut self, session: SessionId);

    /// Queues `payload` as one message.
    ///
    /// `Ok(payload.len())` means it was accepted; `Ok(0)` means the transport
    /// is momentarily saturated and the same payload should be retried on the
    /// next writable turn. Anything else is fatal for the session.
    fn write(&mut self, session: SessionId, payload: &[u8]) -> io::Result<usize>;

    /// Tears the connection down. No further events are delivered for it.
    fn close(&mut self, session: SessionId);
}

/// One unit of work handed from the event loop to the broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent<'a> {
    Connected(SessionId),
    Disconnected(SessionId),
    Received(SessionId, &'a [u8]),
    Writable(SessionId),
    /// A producer published new data.
    Wake,
}
