// SPDX-License-Identifier: MPL-2.0

//! PINGREQ and PINGRESP, the empty keepalive pair.

use serde::{Deserialize, Serialize};

use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::ParseError;

fn decode_empty(
    buffer: &[u8],
    expected: ControlPacketType,
    name: &str,
) -> Result<usize, ParseError> {
    let (flags, body, total) = split_frame(buffer, expected)?;
    if flags != 0 {
        return Err(ParseError::Malformed(format!(
            "{name} fixed-header flags must be 0"
        )));
    }
    if !body.is_empty() {
        return Err(ParseError::Malformed(format!(
            "{name} remaining length must be 0"
        )));
    }
    Ok(total)
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Default)]
pub struct PingReq;

impl ControlPacket for PingReq {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::PingReq
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        Ok(Vec::new())
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        Ok(Vec::new())
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let total = decode_empty(buffer, ControlPacketType::PingReq, "PINGREQ")?;
        Ok((Packet::PingReq(PingReq), total))
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Default)]
pub struct PingResp;

impl ControlPacket for PingResp {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::PingResp
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        Ok(Vec::new())
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        Ok(Vec::new())
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let total = decode_empty(buffer, ControlPacketType::PingResp, "PINGRESP")?;
        Ok((Packet::PingResp(PingResp), total))
    }
}
