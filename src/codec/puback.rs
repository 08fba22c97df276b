// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

use crate::codec::base_data::TwoByteInteger;
use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::ParseError;

/// PUBACK, acknowledging a QoS 1 PUBLISH.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PubAck {
    pub packet_id: u16,
}

impl PubAck {
    pub fn new(packet_id: u16) -> Self {
        Self { packet_id }
    }
}

impl ControlPacket for PubAck {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::PubAck
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        Ok(TwoByteInteger::encode(self.packet_id).to_vec())
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        Ok(Vec::new())
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let (flags, body, total) = split_frame(buffer, ControlPacketType::PubAck)?;
        if flags != 0 {
            return Err(ParseError::malformed("PUBACK fixed-header flags must be 0"));
        }
        if body.len() != 2 {
            return Err(ParseError::malformed("PUBACK remaining length must be 2"));
        }
        let (packet_id, _) = TwoByteInteger::decode(body)?;
        Ok((Packet::PubAck(PubAck::new(packet_id)), total))
    }
}
