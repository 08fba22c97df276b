// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

use crate::codec::base_data::TwoByteInteger;
use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::ParseError;

/// Return code a broker uses to refuse one filter of a SUBSCRIBE.
pub const SUBACK_FAILURE: u8 = 0x80;

/// SUBACK, one return code per filter of the SUBSCRIBE it answers.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct SubAck {
    pub packet_id: u16,
    pub return_codes: Vec<u8>,
}

impl SubAck {
    pub fn new(packet_id: u16, return_codes: Vec<u8>) -> Self {
        Self {
            packet_id,
            return_codes,
        }
    }
}

fn check_return_codes(codes: &[u8]) -> Result<(), ParseError> {
    if codes.is_empty() {
        return Err(ParseError::malformed("SUBACK carries no return codes"));
    }
    for &code in codes {
        if !matches!(code, 0x00 | 0x01 | 0x02 | SUBACK_FAILURE) {
            return Err(ParseError::Malformed(format!(
                "invalid SUBACK return code {code:#04x}"
            )));
        }
    }
    Ok(())
}

impl ControlPacket for SubAck {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::SubAck
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        Ok(TwoByteInteger::encode(self.packet_id).to_vec())
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        check_return_codes(&self.return_codes)?;
        Ok(self.return_codes.clone())
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let (flags, body, total) = split_frame(buffer, ControlPacketType::SubAck)?;
        if flags != 0 {
            return Err(ParseError::malformed("SUBACK fixed-header flags must be 0"));
        }
        let (packet_id, offset) = TwoByteInteger::decode(body)?;
        let return_codes = body[offset..].to_vec();
        check_return_codes(&return_codes)?;
        Ok((Packet::SubAck(SubAck::new(packet_id, return_codes)), total))
    }
}
