//! Packet framing for the client transport
//!
//! Every packet is `[size u16 BE][0x00][id u16 BE][index u16 BE][payload]`,
//! where `size` counts the payload plus the five bytes following it.

use bytes::{Buf, BufMut, BytesMut};
use prost::Message;
use thiserror::Error;

use crate::constants::{PACKET_HEADER_SIZE, PACKET_SIZE_OVERHEAD};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Packet size {size} is smaller than the header")]
    SizeTooSmall { size: usize },

    #[error("Packet size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    #[error("Outgoing payload of {0} bytes does not fit a u16 size field")]
    PayloadTooLarge(usize),
}

/// One decoded client packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: u16,
    pub index: u16,
    pub payload: Vec<u8>,
}

/// A response waiting to be framed with the index of the request that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub id: u16,
    pub payload: Vec<u8>,
}

impl Outgoing {
    pub fn message<M: Message>(id: u16, message: &M) -> Self {
        Self {
            id,
            payload: message.encode_to_vec(),
        }
    }

    /// Decode the payload back into a message. Used by handler tests.
    #[cfg(test)]
    pub fn decode<M: Message + Default>(&self) -> M {
        M::decode(self.payload.as_slice()).expect("response payload decodes")
    }
}

/// Try to take one complete packet off the front of `buffer`.
///
/// Returns `Ok(None)` when more bytes are needed.
pub fn decode_packet(buffer: &mut BytesMut, max_size: usize) -> Result<Option<Packet>, FrameError> {
    if buffer.len() < 2 {
        return Ok(None);
    }

    let size = u16::from_be_bytes([buffer[0], buffer[1]]) as usize;
    if size < PACKET_SIZE_OVERHEAD {
        return Err(FrameError::SizeTooSmall { size });
    }
    if size > max_size {
        return Err(FrameError::TooLarge {
            size,
            max: max_size,
        });
    }
    if buffer.len() < size + 2 {
        return Ok(None);
    }

    let mut frame = buffer.split_to(size + 2);
    frame.advance(3);
    let id = frame.get_u16();
    let index = frame.get_u16();

    Ok(Some(Packet {
        id,
        index,
        payload: frame.to_vec(),
    }))
}

/// Frame an outgoing payload, echoing the request index.
pub fn encode_packet(id: u16, index: u16, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let size = payload.len() + PACKET_SIZE_OVERHEAD;
    let size = u16::try_from(size).map_err(|_| FrameError::PayloadTooLarge(payload.len()))?;

    let mut out = Vec::with_capacity(PACKET_HEADER_SIZE + payload.len());
    out.put_u16(size);
    out.put_u8(0);
    out.put_u16(id);
    out.put_u16(index);
    out.extend_from_slice(payload);
    Ok(out)
}
