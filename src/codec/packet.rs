// SPDX-License-Identifier: MPL-2.0

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::codec::base_data::VariableByteInteger;
use crate::codec::{packet_type, ParseError, MAX_OUTBOUND_REMAINING_LENGTH};

use crate::codec::connack::ConnAck;
use crate::codec::connect::Connect;
use crate::codec::disconnect::Disconnect;
use crate::codec::ping::{PingReq, PingResp};
use crate::codec::puback::PubAck;
use crate::codec::publish::Publish;
use crate::codec::suback::SubAck;
use crate::codec::subscribe::Subscribe;
use crate::codec::unsuback::UnsubAck;
use crate::codec::unsubscribe::Unsubscribe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
}

impl TryFrom<u8> for ControlPacketType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ControlPacketType::Connect),
            2 => Ok(ControlPacketType::ConnAck),
            3 => Ok(ControlPacketType::Publish),
            4 => Ok(ControlPacketType::PubAck),
            8 => Ok(ControlPacketType::Subscribe),
            9 => Ok(ControlPacketType::SubAck),
            10 => Ok(ControlPacketType::Unsubscribe),
            11 => Ok(ControlPacketType::UnsubAck),
            12 => Ok(ControlPacketType::PingReq),
            13 => Ok(ControlPacketType::PingResp),
            14 => Ok(ControlPacketType::Disconnect),
            other => Err(ParseError::InvalidPacketType(other)),
        }
    }
}

/// A complete MQTT v3.1.1 control packet.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    Connect(Connect),
    ConnAck(ConnAck),
    Publish(Publish),
    PubAck(PubAck),
    Subscribe(Subscribe),
    SubAck(SubAck),
    Unsubscribe(Unsubscribe),
    UnsubAck(UnsubAck),
    PingReq(PingReq),
    PingResp(PingResp),
    Disconnect(Disconnect),
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        match self {
            Packet::Connect(p) => p.encode(),
            Packet::ConnAck(p) => p.encode(),
            Packet::Publish(p) => p.encode(),
            Packet::PubAck(p) => p.encode(),
            Packet::Subscribe(p) => p.encode(),
            Packet::SubAck(p) => p.encode(),
            Packet::Unsubscribe(p) => p.encode(),
            Packet::UnsubAck(p) => p.encode(),
            Packet::PingReq(p) => p.encode(),
            Packet::PingResp(p) => p.encode(),
            Packet::Disconnect(p) => p.encode(),
        }
    }

    /// Decodes one complete frame, returning the packet and the number of
    /// bytes consumed.
    pub fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        match ControlPacketType::try_from(packet_type(buffer)?)? {
            ControlPacketType::Connect => Connect::decode(buffer),
            ControlPacketType::ConnAck => ConnAck::decode(buffer),
            ControlPacketType::Publish => Publish::decode(buffer),
            ControlPacketType::PubAck => PubAck::decode(buffer),
            ControlPacketType::Subscribe => Subscribe::decode(buffer),
            ControlPacketType::SubAck => SubAck::decode(buffer),
            ControlPacketType::Unsubscribe => Unsubscribe::decode(buffer),
            ControlPacketType::UnsubAck => UnsubAck::decode(buffer),
            ControlPacketType::PingReq => PingReq::decode(buffer),
            ControlPacketType::PingResp => PingResp::decode(buffer),
            ControlPacketType::Disconnect => Disconnect::decode(buffer),
        }
    }

    /// Human-readable packet name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Connect(_) => "CONNECT",
            Packet::ConnAck(_) => "CONNACK",
            Packet::Publish(_) => "PUBLISH",
            Packet::PubAck(_) => "PUBACK",
            Packet::Subscribe(_) => "SUBSCRIBE",
            Packet::SubAck(_) => "SUBACK",
            Packet::Unsubscribe(_) => "UNSUBSCRIBE",
            Packet::UnsubAck(_) => "UNSUBACK",
            Packet::PingReq(_) => "PINGREQ",
            Packet::PingResp(_) => "PINGRESP",
            Packet::Disconnect(_) => "DISCONNECT",
        }
    }
}

/// Encoding and decoding surface shared by every control packet.
pub trait ControlPacket {
    fn packet_type(&self) -> ControlPacketType;

    /// Fixed-header flag nibble; all-zero for every packet except PUBLISH,
    /// SUBSCRIBE and UNSUBSCRIBE.
    fn flags(&self) -> u8 {
        0
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError>;

    fn payload(&self) -> Result<Vec<u8>, ParseError>;

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError>
    where
        Self: Sized;

    fn fixed_header(&self, remaining: usize) -> Vec<u8> {
        let mut hdr = vec![(self.packet_type() as u8) << 4 | self.flags()];
        hdr.extend(VariableByteInteger::encode(remaining as u32));
        hdr
    }

    fn encode(&self) -> Result<Vec<u8>, ParseError> {
        let vhdr = self.variable_header()?;
        let payload = self.payload()?;
        let remaining = vhdr.len() + payload.len();
        if remaining > MAX_OUTBOUND_REMAINING_LENGTH {
            return Err(ParseError::FrameTooLarge);
        }
        let mut bytes = self.fixed_header(remaining);
        bytes.extend(vhdr);
        bytes.extend(payload);
        Ok(bytes)
    }
}

/// Validates the type nibble and remaining length of a frame, returning the
/// flag nibble, the frame body and the total frame length.
pub(crate) fn split_frame(
    buffer: &[u8],
    expected: ControlPacketType,
) -> Result<(u8, &[u8], usize), ParseError> {
    let first = *buffer.first().ok_or(ParseError::BufferTooShort)?;
    if first >> 4 != expected as u8 {
        return Err(ParseError::InvalidPacketType(first >> 4));
    }
    let (remaining, vbi_len) = VariableByteInteger::decode(&buffer[1..])?;
    let start = 1 + vbi_len;
    let total = start + remaining;
    if buffer.len() < total {
        return Err(ParseError::Truncated(total - buffer.len()));
    }
    Ok((first & 0x0F, &buffer[start..total], total))
}
