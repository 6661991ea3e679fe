mod server;
mod transport;

pub use server::WsServer;
pub use transport::WsTransport;
