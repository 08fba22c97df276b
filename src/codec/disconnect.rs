// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::ParseError;

/// DISCONNECT, the client's final packet before an orderly close.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Default)]
pub struct Disconnect;

impl ControlPacket for Disconnect {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::Disconnect
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        Ok(Vec::new())
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        Ok(Vec::new())
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let (flags, body, total) = split_frame(buffer, ControlPacketType::Disconnect)?;
        if flags != 0 {
            return Err(ParseError::malformed("DISCONNECT fixed-header flags must be 0"));
        }
        if !body.is_empty() {
            return Err(ParseError::malformed("DISCONNECT remaining length must be 0"));
        }
        Ok((Packet::Disconnect(Disconnect), total))
    }
}
