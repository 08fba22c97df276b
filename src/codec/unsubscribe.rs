// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

use crate::codec::base_data::{TwoByteInteger, Utf8String};
use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::{encode_utf8_string, ParseError};

/// UNSUBSCRIBE, removing one or more topic filters.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Unsubscribe {
    pub packet_id: u16,
    pub filters: Vec<String>,
}

impl Unsubscribe {
    pub fn new(packet_id: u16, filters: Vec<String>) -> Self {
        Self { packet_id, filters }
    }

    pub fn single(packet_id: u16, filter: impl Into<String>) -> Self {
        Self::new(packet_id, vec![filter.into()])
    }
}

impl ControlPacket for Unsubscribe {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::Unsubscribe
    }

    fn flags(&self) -> u8 {
        0x02
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        Ok(TwoByteInteger::encode(self.packet_id).to_vec())
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        if self.filters.is_empty() {
            return Err(ParseError::malformed("UNSUBSCRIBE requires at least one filter"));
        }
        let mut payload = Vec::new();
        for filter in &self.filters {
            payload.extend(encode_utf8_string(filter)?);
        }
        Ok(payload)
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let (flags, body, total) = split_frame(buffer, ControlPacketType::Unsubscribe)?;
        if flags != 0x02 {
            return Err(ParseError::malformed(
                "UNSUBSCRIBE fixed-header flags must be 0b0010",
            ));
        }
        let (packet_id, mut offset) = TwoByteInteger::decode(body)?;
        let mut filters = Vec::new();
        while offset < body.len() {
            let (filter, consumed) = Utf8String::decode(&body[offset..])?;
            offset += consumed;
            filters.push(filter);
        }
        if filters.is_empty() {
            return Err(ParseError::malformed("UNSUBSCRIBE carries no filters"));
        }
        Ok((Packet::Unsubscribe(Unsubscribe::new(packet_id, filters)), total))
    }
}
