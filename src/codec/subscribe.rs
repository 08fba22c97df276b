// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

use crate::codec::base_data::{TwoByteInteger, Utf8String};
use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::{encode_utf8_string, ParseError};

/// One topic filter plus requested QoS inside a SUBSCRIBE.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub filter: String,
    pub qos: u8,
}

/// SUBSCRIBE, requesting one or more subscriptions.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Subscribe {
    pub packet_id: u16,
    pub subscriptions: Vec<Subscription>,
}

impl Subscribe {
    pub fn new(packet_id: u16, subscriptions: Vec<Subscription>) -> Self {
        Self {
            packet_id,
            subscriptions,
        }
    }

    pub fn single(packet_id: u16, filter: impl Into<String>, qos: u8) -> Self {
        Self::new(
            packet_id,
            vec![Subscription {
                filter: filter.into(),
                qos,
            }],
        )
    }
}

impl ControlPacket for Subscribe {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::Subscribe
    }

    fn flags(&self) -> u8 {
        // bits 3..0 are fixed at 0b0010
        0x02
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        Ok(TwoByteInteger::encode(self.packet_id).to_vec())
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        if self.subscriptions.is_empty() {
            return Err(ParseError::malformed("SUBSCRIBE requires at least one filter"));
        }
        let mut payload = Vec::new();
        for sub in &self.subscriptions {
            if sub.qos > 1 {
                return Err(ParseError::malformed("requested QoS above 1 is not supported"));
            }
            payload.extend(encode_utf8_string(&sub.filter)?);
            payload.push(sub.qos);
        }
        Ok(payload)
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let (flags, body, total) = split_frame(buffer, ControlPacketType::Subscribe)?;
        if flags != 0x02 {
            return Err(ParseError::malformed("SUBSCRIBE fixed-header flags must be 0b0010"));
        }
        let (packet_id, mut offset) = TwoByteInteger::decode(body)?;

        let mut subscriptions = Vec::new();
        while offset < body.len() {
            let (filter, consumed) = Utf8String::decode(&body[offset..])?;
            offset += consumed;
            let qos = *body.get(offset).ok_or_else(|| {
                ParseError::malformed("SUBSCRIBE filter is missing its QoS byte")
            })?;
            offset += 1;
            if qos > 2 {
                return Err(ParseError::malformed("SUBSCRIBE requested QoS above 2"));
            }
            subscriptions.push(Subscription { filter, qos });
        }
        if subscriptions.is_empty() {
            return Err(ParseError::malformed("SUBSCRIBE carries no filters"));
        }

        Ok((Packet::Subscribe(Subscribe::new(packet_id, subscriptions)), total))
    }
}
