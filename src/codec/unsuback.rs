// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

use crate::codec::base_data::TwoByteInteger;
use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::ParseError;

/// UNSUBACK, acknowledging an UNSUBSCRIBE.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct UnsubAck {
    pub packet_id: u16,
}

impl UnsubAck {
    pub fn new(packet_id: u16) -> Self {
        Self { packet_id }
    }
}

impl ControlPacket for UnsubAck {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::UnsubAck
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        Ok(TwoByteInteger::encode(self.packet_id).to_vec())
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        Ok(Vec::new())
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let (flags, body, total) = split_frame(buffer, ControlPacketType::UnsubAck)?;
        if flags != 0 {
            return Err(ParseError::malformed("UNSUBACK fixed-header flags must be 0"));
        }
        if body.len() != 2 {
            return Err(ParseError::malformed("UNSUBACK remaining length must be 2"));
        }
        let (packet_id, _) = TwoByteInteger::decode(body)?;
        Ok((Packet::UnsubAck(UnsubAck::new(packet_id)), total))
    }
}
