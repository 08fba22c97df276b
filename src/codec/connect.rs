// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};

use crate::codec::base_data::TwoByteInteger;
use crate::codec::packet::{split_frame, ControlPacket, ControlPacketType, Packet};
use crate::codec::{encode_binary_data, encode_utf8_string, ParseError};

use crate::codec::base_data::Utf8String;

/// Will message registered with the broker at connect time.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Will {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: u8,
    pub retain: bool,
}

/// CONNECT, the first packet sent on every new link.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Connect {
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl Connect {
    pub fn new(client_id: impl Into<String>, keep_alive: u16, clean_session: bool) -> Self {
        Self {
            clean_session,
            keep_alive,
            client_id: client_id.into(),
            will: None,
            username: None,
            password: None,
        }
    }

    fn connect_flags(&self) -> Result<u8, ParseError> {
        let mut flags = 0u8;
        if self.clean_session {
            flags |= 0x02;
        }
        if let Some(will) = &self.will {
            if will.qos > 1 {
                return Err(ParseError::malformed("will QoS above 1 is not supported"));
            }
            flags |= 0x04;
            flags |= will.qos << 3;
            if will.retain {
                flags |= 0x20;
            }
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ParseError::malformed("password requires a username"));
        }
        if self.username.is_some() {
            flags |= 0x80;
        }
        if self.password.is_some() {
            flags |= 0x40;
        }
        Ok(flags)
    }
}

impl ControlPacket for Connect {
    fn packet_type(&self) -> ControlPacketType {
        ControlPacketType::Connect
    }

    fn variable_header(&self) -> Result<Vec<u8>, ParseError> {
        let mut vh = Vec::new();
        vh.extend(Utf8String::encode("MQTT"));
        vh.push(4); // protocol level 4 = v3.1.1
        vh.push(self.connect_flags()?);
        vh.extend_from_slice(&TwoByteInteger::encode(self.keep_alive));
        Ok(vh)
    }

    fn payload(&self) -> Result<Vec<u8>, ParseError> {
        let mut payload = encode_utf8_string(&self.client_id)?;
        if let Some(will) = &self.will {
            payload.extend(encode_utf8_string(&will.topic)?);
            payload.extend(encode_binary_data(&will.payload)?);
        }
        if let Some(username) = &self.username {
            payload.extend(encode_utf8_string(username)?);
        }
        if let Some(password) = &self.password {
            payload.extend(encode_binary_data(password)?);
        }
        Ok(payload)
    }

    fn decode(buffer: &[u8]) -> Result<(Packet, usize), ParseError> {
        let (hdr_flags, body, total) = split_frame(buffer, ControlPacketType::Connect)?;
        if hdr_flags != 0 {
            return Err(ParseError::malformed("CONNECT fixed-header flags must be 0"));
        }

        let (proto_name, mut offset) = Utf8String::decode(body)?;
        if proto_name != "MQTT" {
            return Err(ParseError::malformed("invalid protocol name"));
        }

        let version = *body.get(offset).ok_or(ParseError::BufferTooShort)?;
        offset += 1;
        if version != 4 {
            return Err(ParseError::malformed("unsupported protocol level"));
        }

        let flags = *body.get(offset).ok_or(ParseError::BufferTooShort)?;
        offset += 1;
        if flags & 0x01 != 0 {
            return Err(ParseError::malformed("CONNECT reserved flag bit is not 0"));
        }
        let clean_session = flags & 0x02 != 0;
        let will_flag = flags & 0x04 != 0;
        let will_qos = (flags & 0x18) >> 3;
        let will_retain = flags & 0x20 != 0;
        let password_flag = flags & 0x40 != 0;
        let username_flag = flags & 0x80 != 0;
        if password_flag && !username_flag {
            return Err(ParseError::malformed("password flag requires username flag"));
        }

        let (keep_alive, consumed) = TwoByteInteger::decode(&body[offset..])?;
        offset += consumed;

        let (client_id, consumed) = Utf8String::decode(&body[offset..])?;
        offset += consumed;

        let will = if will_flag {
            let (topic, consumed) = Utf8String::decode(&body[offset..])?;
            offset += consumed;
            let (payload, consumed) = crate::codec::base_data::BinaryData::decode(&body[offset..])?;
            offset += consumed;
            Some(Will {
                topic,
                payload,
                qos: will_qos,
                retain: will_retain,
            })
        } else {
            None
        };

        let username = if username_flag {
            let (u, consumed) = Utf8String::decode(&body[offset..])?;
            offset += consumed;
            Some(u)
        } else {
            None
        };

        let password = if password_flag {
            let (p, consumed) = crate::codec::base_data::BinaryData::decode(&body[offset..])?;
            offset += consumed;
            Some(p)
        } else {
            None
        };

        if offset != body.len() {
            return Err(ParseError::malformed("trailing bytes in CONNECT payload"));
        }

        Ok((
            Packet::Connect(Connect {
                clean_session,
                keep_alive,
                client_id,
                will,
                username,
                password,
            }),
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_minimal_roundtrip() {
        let original = Connect::new("bench-07", 60, true);
        let bytes = original.encode().unwrap();
        let (packet, consumed) = Connect::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(packet, Packet::Connect(original));
    }

    #[test]
    fn connect_full_roundtrip() {
        let mut original = Connect::new("bench-07", 30, false);
        original.will = Some(Will {
            topic: "lab/bench-07/status".to_string(),
            payload: b"offline".to_vec(),
            qos: 1,
            retain: true,
        });
        original.username = Some("operator".to_string());
        original.password = Some(b"hunter2".to_vec());

        let bytes = original.encode().unwrap();
        let (packet, _) = Connect::decode(&bytes).unwrap();
        assert_eq!(packet, Packet::Connect(original));
    }

    #[test]
    fn connect_flags_byte_layout() {
        let mut connect = Connect::new("c", 10, true);
        connect.will = Some(Will {
            topic: "t".to_string(),
            payload: vec![],
            qos: 1,
            retain: true,
        });
        connect.username = Some("u".to_string());
        connect.password = Some(vec![1]);
        // clean | will | will-qos-1 | will-retain | password | username
        assert_eq!(connect.connect_flags().unwrap(), 0x02 | 0x04 | 0x08 | 0x20 | 0x40 | 0x80);
    }

    #[test]
    fn connect_encode_rejects_password_without_username() {
        let mut connect = Connect::new("c", 10, true);
        connect.password = Some(b"pass".to_vec());
        assert!(connect.encode().is_err());
    }

    #[test]
    fn connect_decode_rejects_password_without_username() {
        let bytes = vec![
            0x10, 24, // type, remaining length
            0x00, 0x04, b'M', b'Q', b'T', b'T', // protocol name
            0x04, // level
            0x42, // flags: password without username
            0x00, 0x3C, // keep alive
            0x00, 0x06, b'c', b'l', b'i', b'e', b'n', b't', // client id
            0x00, 0x04, b'p', b'a', b's', b's', // password
        ];
        assert!(Connect::decode(&bytes).is_err());
    }

    #[test]
    fn connect_encode_rejects_qos2_will() {
        let mut connect = Connect::new("c", 10, true);
        connect.will = Some(Will {
            topic: "t".to_string(),
            payload: vec![],
            qos: 2,
            retain: false,
        });
        assert!(connect.encode().is_err());
    }
}
