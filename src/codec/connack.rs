// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::ParseError;

pub const CONNECT_ACCEPTED: u8 = 0;

/// CONNACK, the broker's reply to CONNECT.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ConnAck {
    pub session_present: bool,
    /// 0 = accepted; 1..=5 are the refusal codes from the v3.1.1 table.
    pub return_code: u8,
}

impl ConnAck {
    pub fn new(session_present: bool, return_code: u8) -> Self {
        Self {
            session_present,
            return_code,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.return_code == CONNECT_ACCEPTED
    }
}

impl ControlPacket for ConnAck {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::ConnAck
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        if self.return_code > 5 {
            return Err(ParseError::malformed("CONNACK return code above 5"));
        }
        Ok(vec![u8::from(self.session_present), self.return_code])
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        Ok(Vec::new())
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let (flags, body, total) = split_frame(buffer, ControlPacketType::ConnAck)?;
        if flags != 0 {
            return Err(ParseError::malformed("CONNACK fixed-header flags must be 0"));
        }
        if body.len() != 2 {
            return Err(ParseError::malformed("CONNACK remaining length must be 2"));
        }
        if body[0] & 0xFE != 0 {
            return Err(ParseError::malformed(
                "CONNACK acknowledge-flags reserved bits must be 0",
            ));
        }
        if body[1] > 5 {
            return Err(ParseError::malformed("CONNACK return code above 5"));
        }
        Ok((
            Packet::ConnAck(ConnAck::new(body[0] & 0x01 != 0, body[1])),
            total,
        ))
    }
}
