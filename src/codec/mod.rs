// SPDX-License-Identifier: MPL-2.0

//! MQTT v3.1.1 wire codec.
//!
//! Eleven control packets are supported: CONNECT, CONNACK, PUBLISH, PUBACK,
//! SUBSCRIBE, SUBACK, UNSUBSCRIBE, UNSUBACK, PINGREQ, PINGRESP and
//! DISCONNECT. The QoS 2 acknowledgement packets (PUBREC, PUBREL, PUBCOMP)
//! decode to [`ParseError::InvalidPacketType`].

pub mod base_data;
pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod packet;
pub mod ping;
pub mod publish;
pub mod puback;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

use thiserror::Error;

use crate::codec::base_data::{BinaryData, Utf8String};

/// Largest remaining length representable on the wire (four VBI bytes).
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Ceiling applied to outbound frames. Anything a lab client legitimately
/// sends fits in three VBI bytes; a larger frame is a caller bug.
pub const MAX_OUTBOUND_REMAINING_LENGTH: usize = 2_097_151;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The buffer ends before the frame does; the payload is the number of
    /// additional bytes needed.
    #[error("truncated packet, need {0} more bytes")]
    Truncated(usize),
    #[error("malformed packet: {0}")]
    Malformed(String),
    #[error("string exceeds 65535 bytes")]
    StringTooLong,
    #[error("buffer too short")]
    BufferTooShort,
    #[error("invalid or unsupported packet type {0}")]
    InvalidPacketType(u8),
    #[error("outbound frame exceeds {MAX_OUTBOUND_REMAINING_LENGTH} bytes")]
    FrameTooLarge,
    #[error("invalid UTF-8 in string field: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl ParseError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ParseError::Malformed(reason.into())
    }
}

pub(crate) fn encode_utf8_string(s: &str) -> Result<Vec<u8>, ParseError> {
    if s.len() > u16::MAX as usize {
        return Err(ParseError::StringTooLong);
    }
    Ok(Utf8String::encode(s))
}

pub(crate) fn encode_binary_data(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    if data.len() > u16::MAX as usize {
        return Err(ParseError::StringTooLong);
    }
    Ok(BinaryData::encode(data))
}

/// Packet type nibble of the first fixed-header byte.
pub fn packet_type(buffer: &[u8]) -> Result<u8, ParseError> {
    match buffer.first() {
        Some(b) => Ok(b >> 4),
        None => Err(ParseError::BufferTooShort),
    }
}
