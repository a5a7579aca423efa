//! Wire messages, the protobuf codec and endpoint naming.

pub mod codec;
pub mod endpoints;
pub mod gatt;
pub mod messages;

pub use codec::{decode, encode, ProtocolError, WireMessage};
pub use endpoints::SessionKind;
