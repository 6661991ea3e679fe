//! Single-threaded WebSocket event loop.
//!
//! Every socket is non-blocking. One turn of the loop accepts new
//! connections, advances pending handshakes, drains inbound frames, serves
//! the writable turns the broadcaster requested, and flushes outgoing
//! buffers. When no writable work is ready the loop parks on the
//! [`WakeSignal`] for at most the poll interval.

use crate::transport::WsTransport;
use quartz_engine::{Broadcaster, LoopEvent, SessionId, Shutdown, WakeSignal};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tungstenite::handshake::MidHandshake;
use tungstenite::handshake::server::{NoCallback, ServerHandshake};
use tungstenite::protocol::WebSocketConfig;
use tungstenite::{Error as WsError, HandshakeError, Message, WebSocket};

type Role = ServerHandshake<TcpStream, NoCallback>;

/// Cap on bytes tungstenite may buffer per socket before writes are refused.
const MAX_WRITE_BUFFER: usize = 1 << 20;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

struct PendingHandshake {
    peer: SocketAddr,
    started: Instant,
    mid: MidHandshake<Role>,
}

pub struct WsServer {
    listener: TcpListener,
    wake: Arc<WakeSignal>,
    poll_interval: Duration,
    config: WebSocketConfig,
    handshake_timeout: Duration,
    handshakes: Vec<PendingHandshake>,
    /// Sessions whose handshake finished but were not announced yet.
    connected: Vec<SessionId>,
    transport: WsTransport,
    next_session: u64,
}

enum Inbound {
    Data(SessionId, Vec<u8>),
    Gone(SessionId),
}

impl WsServer {
    pub fn bind<A: ToSocketAddrs>(addr: A, poll_interval: Duration) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            wake: Arc::new(WakeSignal::new()),
            poll_interval,
            config: WebSocketConfig::default().max_write_buffer_size(MAX_WRITE_BUFFER),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            handshakes: Vec::new(),
            connected: Vec::new(),
            transport: WsTransport::default(),
            next_session: 0,
        })
    }

    /// Connections still mid-upgrade after `timeout` are dropped.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Wake handle for producers; pass it to `Service::start`.
    pub fn wake_signal(&self) -> Arc<WakeSignal> {
        Arc::clone(&self.wake)
    }

    pub fn connection_count(&self) -> usize {
        self.transport.len()
    }

    /// Runs until `shutdown` fires, then sends a close frame to every client.
    pub fn run(&mut self, broadcaster: &mut Broadcaster, shutdown: &Shutdown) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "listening");
        while !shutdown.is_triggered() {
            self.turn(broadcaster);
        }
        self.handshakes.clear();
        let connections = self.connection_count();
        broadcaster.disconnect_all(&mut self.transport);
        info!(connections, "event loop stopped");
        Ok(())
    }

    /// One pass over every source of work. Per-connection failures are
    /// logged and cost only that connection.
    pub fn turn(&mut self, broadcaster: &mut Broadcaster) {
        self.accept();
        self.advance_handshakes();
        for id in self.connected.drain(..) {
            broadcaster.handle(&mut self.transport, LoopEvent::Connected(id));
        }
        self.read_all(broadcaster);

        for id in self.transport.take_ready() {
            broadcaster.handle(&mut self.transport, LoopEvent::Writable(id));
        }
        self.flush_all(broadcaster);

        let woke = if self.transport.has_ready() {
            self.wake.take()
        } else {
            self.wake.wait_timeout(self.poll_interval)
        };
        if woke {
            broadcaster.handle(&mut self.transport, LoopEvent::Wake);
        }
    }

    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_nonblocking(true) {
                        warn!(%peer, error = %err, "failed to make socket non-blocking, dropping");
                        continue;
                    }
                    if let Err(err) = stream.set_nodelay(true) {
                        debug!(%peer, error = %err, "failed to set TCP_NODELAY");
                    }
                    debug!(%peer, "connection accepted");
                    let result = tungstenite::accept_with_config(stream, Some(self.config));
                    self.settle(peer, Instant::now(), result);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    return;
                }
            }
        }
    }

    fn advance_handshakes(&mut self) {
        for pending in std::mem::take(&mut self.handshakes) {
            let waited = pending.started.elapsed();
            if waited >= self.handshake_timeout {
                warn!(
                    peer = %pending.peer,
                    waited_ms = waited.as_millis() as u64,
                    "websocket handshake timed out, dropping connection"
                );
                continue;
            }
            self.settle(pending.peer, pending.started, pending.mid.handshake());
        }
    }

    fn settle(
        &mut self,
        peer: SocketAddr,
        started: Instant,
        result: Result<WebSocket<TcpStream>, HandshakeError<Role>>,
    ) {
        match result {
            Ok(socket) => {
                let id = SessionId(self.next_session);
                self.next_session += 1;
                debug!(%peer, session = %id, "handshake complete");
                self.transport.insert(id, socket);
                self.connected.push(id);
            }
            Err(HandshakeError::Interrupted(mid)) => self.handshakes.push(PendingHandshake {
                peer,
                started,
                mid,
            }),
            Err(HandshakeError::Failure(err)) => {
                warn!(%peer, error = %err, "websocket handshake failed")
            }
        }
    }

    fn read_all(&mut self, broadcaster: &mut Broadcaster) {
        let mut inbound = Vec::new();
        for (&id, conn) in self.transport.connections.iter_mut() {
            loop {
                match conn.socket.read() {
                    Ok(Message::Text(text)) => {
                        inbound.push(Inbound::Data(id, text.as_bytes().to_vec()))
                    }
                    Ok(Message::Binary(bytes)) => inbound.push(Inbound::Data(id, bytes.to_vec())),
                    // Pings are answered inside tungstenite; a close is
                    // acknowledged there and surfaces as ConnectionClosed next.
                    Ok(_) => {}
                    Err(WsError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => break,
                    Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                        inbound.push(Inbound::Gone(id));
                        break;
                    }
                    Err(err) => {
                        debug!(session = %id, error = %err, "read failed");
                        inbound.push(Inbound::Gone(id));
                        break;
                    }
                }
            }
        }

        for event in inbound {
            match event {
                Inbound::Data(id, bytes) => {
                    broadcaster.handle(&mut self.transport, LoopEvent::Received(id, &bytes))
                }
                Inbound::Gone(id) => {
                    if self.transport.forget(id) {
                        broadcaster.handle(&mut self.transport, LoopEvent::Disconnected(id));
                    }
                }
            }
        }
    }

    fn flush_all(&mut self, broadcaster: &mut Broadcaster) {
        let mut failed = Vec::new();
        for (&id, conn) in self.transport.connections.iter_mut() {
            match conn.socket.flush() {
                Ok(()) => conn.backlogged = false,
                Err(WsError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => {
                    conn.backlogged = true
                }
                Err(err) => {
                    debug!(session = %id, error = %err, "flush failed");
                    failed.push(id);
                }
            }
        }
        for id in failed {
            if self.transport.forget(id) {
                broadcaster.handle(&mut self.transport, LoopEvent::Disconnected(id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartz_ring::{BroadcastRing, CommandRing, RingConfig};
    use std::io::Read;
    use std::thread;

    fn broadcaster() -> Broadcaster {
        Broadcaster::new(
            Arc::new(BroadcastRing::new(RingConfig::new(8))),
            Arc::new(CommandRing::new(RingConfig::new(8))),
        )
    }

    fn server(timeout: Duration) -> WsServer {
        WsServer::bind("127.0.0.1:0", Duration::from_millis(5))
            .unwrap()
            .with_handshake_timeout(timeout)
    }

    fn turn_until(
        server: &mut WsServer,
        b: &mut Broadcaster,
        done: impl Fn(&WsServer) -> bool,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            server.turn(b);
            if done(server) {
                return true;
            }
        }
        false
    }

    #[test]
    fn idle_connections_are_dropped_after_handshake_timeout() {
        let mut server = server(Duration::from_millis(300));
        let addr = server.local_addr().unwrap();
        let mut b = broadcaster();

        let mut idle: Vec<TcpStream> = (0..20).map(|_| TcpStream::connect(addr).unwrap()).collect();
        assert!(turn_until(&mut server, &mut b, |s| s.handshakes.len() == 20));
        assert!(turn_until(&mut server, &mut b, |s| s.handshakes.is_empty()));
        assert_eq!(server.connection_count(), 0);

        // The server side closed the socket.
        let stream = &mut idle[0];
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn server_keeps_admitting_clients_after_evictions() {
        let mut server = server(Duration::from_millis(100));
        let addr = server.local_addr().unwrap();
        let mut b = broadcaster();

        let _idle = TcpStream::connect(addr).unwrap();
        // A peer that leaves before sending the upgrade request.
        drop(TcpStream::connect(addr).unwrap());
        assert!(turn_until(&mut server, &mut b, |s| !s.handshakes.is_empty()));
        assert!(turn_until(&mut server, &mut b, |s| s.handshakes.is_empty()));

        let client = thread::spawn(move || {
            let stream = TcpStream::connect(addr).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            tungstenite::client(format!("ws://{addr}/"), stream).map(|_| ())
        });
        assert!(turn_until(&mut server, &mut b, |s| s.connection_count() == 1));
        assert!(client.join().unwrap().is_ok());
        assert_eq!(b.sessions().len(), 1);
    }
}
