//! Protocol handling for the chapter client
//!
//! Packets carry protobuf payloads (proto2 encoding) behind a seven-byte
//! big-endian header.

mod frame;
mod messages;
pub mod wire;

pub use frame::{decode_packet, encode_packet, Outgoing, Packet};
pub use messages::*;
pub use wire::{Preserved, WireError};
