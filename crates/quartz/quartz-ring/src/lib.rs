mod broadcast;
mod command;
mod message;
mod ring;

pub use broadcast::{BroadcastRing, ConsumerId};
pub use command::CommandRing;
pub use message::Message;
pub use ring::RingConfig;
