use quartz_engine::{SessionId, Transport};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::TcpStream;
use tracing::{debug, trace};
use tungstenite::{Error as WsError, Message, WebSocket};

pub(crate) struct Connection {
    pub(crate) socket: WebSocket<TcpStream>,
    /// Bytes are queued in tungstenite that the socket has not accepted yet.
    pub(crate) backlogged: bool,
}

/// Open WebSocket sessions plus the writable turns the broadcaster asked for.
#[derive(Default)]
pub struct WsTransport {
    pub(crate) connections: HashMap<SessionId, Connection>,
    writable: VecDeque<SessionId>,
}

impl WsTransport {
    pub(crate) fn insert(&mut self, id: SessionId, socket: WebSocket<TcpStream>) {
        self.connections.insert(
            id,
            Connection {
                socket,
                backlogged: false,
            },
        );
    }

    /// Drops the socket without a close handshake. Returns whether it existed.
    pub(crate) fn forget(&mut self, id: SessionId) -> bool {
        self.writable.retain(|&s| s != id);
        self.connections.remove(&id).is_some()
    }

    /// Writable turns that can be served now. Backlogged sessions wait for
    /// their buffered bytes to drain first.
    pub(crate) fn take_ready(&mut self) -> Vec<SessionId> {
        let mut ready = Vec::new();
        let mut deferred = VecDeque::new();
        while let Some(id) = self.writable.pop_front() {
            match self.connections.get(&id) {
                Some(conn) if conn.backlogged => deferred.push_back(id),
                Some(_) if !ready.contains(&id) => ready.push(id),
                _ => {}
            }
        }
        self.writable = deferred;
        ready
    }

    pub(crate) fn has_ready(&self) -> bool {
        self.writable
            .iter()
            .any(|id| self.connections.get(id).is_some_and(|c| !c.backlogged))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Transport for WsTransport {
    fn request_writable(&mut self, session: SessionId) {
        if !self.writable.contains(&session) {
            self.writable.push_back(session);
        }
    }

    fn write(&mut self, session: SessionId, payload: &[u8]) -> io::Result<usize> {
        let conn = self
            .connections
            .get_mut(&session)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let message = match std::str::from_utf8(payload) {
            Ok(text) => Message::text(text),
            Err(_) => Message::binary(payload.to_vec()),
        };
        match conn.socket.write(message) {
            Ok(()) => Ok(payload.len()),
            // The frame is buffered; the socket just could not take it all yet.
            Err(WsError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => {
                conn.backlogged = true;
                Ok(payload.len())
            }
            Err(WsError::WriteBufferFull(_)) => {
                trace!(session = %session, "write buffer full");
                conn.backlogged = true;
                Ok(0)
            }
            Err(WsError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::other(err)),
        }
    }

    fn close(&mut self, session: SessionId) {
        self.writable.retain(|&s| s != session);
        if let Some(mut conn) = self.connections.remove(&session) {
            // Best effort: the peer may already be gone.
            if let Err(err) = conn.socket.close(None) {
                debug!(session = %session, error = %err, "close frame not delivered");
            }
        }
    }
}
