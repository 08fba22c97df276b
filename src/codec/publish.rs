// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

use crate::codec::base_data::TwoByteInteger;
use crate::codec::base_data::Utf8String;
use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::{encode_utf8_string, ParseError};

/// PUBLISH, carrying an application message in either direction.
///
/// `packet_id` is present exactly when `qos > 0`. A decoded packet may carry
/// `qos == 2`; rejecting that is the delivery layer's call, not the codec's.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Publish {
    pub dup: bool,
    pub qos: u8,
    pub retain: bool,
    pub topic: String,
    pub packet_id: Option<u16>,
    pub payload: Vec<u8>,
}

impl Publish {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            dup: false,
            qos: 0,
            retain: false,
            topic: topic.into(),
            packet_id: None,
            payload,
        }
    }

    pub fn with_qos1(topic: impl Into<String>, payload: Vec<u8>, packet_id: u16) -> Self {
        Self {
            dup: false,
            qos: 1,
            retain: false,
            topic: topic.into(),
            packet_id: Some(packet_id),
            payload,
        }
    }
}

impl ControlPacket for Publish {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::Publish
    }

    fn flags(&self) -> u8 {
        (u8::from(self.dup) << 3) | (self.qos << 1) | u8::from(self.retain)
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        if self.qos > 1 {
            return Err(ParseError::malformed("outbound QoS above 1 is not supported"));
        }
        if self.topic.contains(['#', '+']) {
            return Err(ParseError::malformed("PUBLISH topic must not contain wildcards"));
        }
        let mut vh = encode_utf8_string(&self.topic)?;
        match (self.qos, self.packet_id) {
            (0, None) => {}
            (0, Some(_)) => {
                return Err(ParseError::malformed("QoS 0 PUBLISH must not carry a packet id"))
            }
            (_, Some(id)) => vh.extend_from_slice(&TwoByteInteger::encode(id)),
            (_, None) => {
                return Err(ParseError::malformed("QoS 1 PUBLISH requires a packet id"))
            }
        }
        Ok(vh)
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        Ok(self.payload.clone())
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let (flags, body, total) = split_frame(buffer, ControlPacketType::Publish)?;
        let dup = flags & 0x08 != 0;
        let qos = (flags & 0x06) >> 1;
        let retain = flags & 0x01 != 0;
        if qos == 3 {
            return Err(ParseError::malformed("PUBLISH QoS bits are 3"));
        }
        if qos == 0 && dup {
            return Err(ParseError::malformed("QoS 0 PUBLISH must not set DUP"));
        }

        let (topic, mut offset) = Utf8String::decode(body)?;
        let packet_id = if qos > 0 {
            let (id, consumed) = TwoByteInteger::decode(&body[offset..])?;
            offset += consumed;
            if id == 0 {
                return Err(ParseError::malformed("PUBLISH packet id must be non-zero"));
            }
            Some(id)
        } else {
            None
        };
        let payload = body[offset..].to_vec();

        Ok((
            Packet::Publish(Publish {
                dup,
                qos,
                retain,
                topic,
                packet_id,
                payload,
            }),
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_qos0_wire_format() {
        let publish = Publish::new("a/b", vec![1, 2, 3]);
        let bytes = publish.encode().unwrap();
        assert_eq!(
            bytes,
            vec![0x30, 8, 0x00, 0x03, b'a', b'/', b'b', 1, 2, 3]
        );
    }

    #[test]
    fn publish_qos1_retained_dup_wire_format() {
        let mut publish = Publish::with_qos1("a/b", vec![1, 2, 3], 123);
        publish.dup = true;
        publish.retain = true;
        let bytes = publish.encode().unwrap();
        assert_eq!(
            bytes,
            vec![0x3B, 10, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x7B, 1, 2, 3]
        );
    }

    #[test]
    fn publish_roundtrip() {
        let original = Publish::with_qos1("lab/bench-07/adc", b"0.482".to_vec(), 42);
        let bytes = original.encode().unwrap();
        let (packet, consumed) = Publish::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(packet, Packet::Publish(original));
    }

    #[test]
    fn publish_decode_rejects_qos3() {
        let bytes = vec![0x36, 7, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x01];
        assert!(Publish::decode(&bytes).is_err());
    }

    #[test]
    fn publish_decode_accepts_qos2_frame() {
        // QoS 2 is wire-legal even though this client refuses to deliver it.
        let bytes = vec![0x34, 7, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x07];
        let (packet, _) = Publish::decode(&bytes).unwrap();
        match packet {
            Packet::Publish(p) => {
                assert_eq!(p.qos, 2);
                assert_eq!(p.packet_id, Some(7));
            }
            other => panic!("expected PUBLISH, got {}", other.name()),
        }
    }

    #[test]
    fn publish_encode_rejects_qos2() {
        let mut publish = Publish::with_qos1("a", vec![], 1);
        publish.qos = 2;
        assert!(publish.encode().is_err());
    }

    #[test]
    fn publish_encode_rejects_wildcard_topic() {
        assert!(Publish::new("lab/+/adc", vec![]).encode().is_err());
    }

    #[test]
    fn publish_decode_rejects_zero_packet_id() {
        let bytes = vec![0x32, 7, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x00];
        assert!(Publish::decode(&bytes).is_err());
    }
}
