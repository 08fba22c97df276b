// SPDX-License-Identifier: MPL-2.0

//! MQTT base data representations (spec 1.5): two-byte integers, the
//! variable byte integer used for remaining lengths, binary data and
//! length-prefixed UTF-8 strings.

use crate::codec::ParseError;

pub struct TwoByteInteger;

impl TwoByteInteger {
    pub fn encode(val: u16) -> [u8; 2] {
        val.to_be_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<(u16, usize), ParseError> {
        if bytes.len() < 2 {
            return Err(ParseError::BufferTooShort);
        }
        Ok((u16::from_be_bytes([bytes[0], bytes[1]]), 2))
    }
}

pub struct VariableByteInteger;

impl VariableByteInteger {
    pub fn encode(val: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut num = val;
        loop {
            let mut byte = (num % 128) as u8;
            num /= 128;
            if num > 0 {
                byte |= 0x80;
            }
            bytes.push(byte);
            if num == 0 {
                break;
            }
        }
        bytes
    }

    /// Decodes a remaining length; at most four bytes are consumed. A
    /// continuation bit on the fourth byte is malformed.
    pub fn decode(buffer: &[u8]) -> Result<(usize, usize), ParseError> {
        let mut multiplier = 1usize;
        let mut value = 0usize;
        let mut i = 0usize;

        loop {
            let byte = *buffer.get(i).ok_or(ParseError::Truncated(1))?;
            if byte & 0x80 != 0 && i == 3 {
                return Err(ParseError::malformed(
                    "remaining length continues past four bytes",
                ));
            }
            value += (byte & 0x7F) as usize * multiplier;
            multiplier *= 128;
            i += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok((value, i))
    }
}

pub struct BinaryData;

impl BinaryData {
    pub fn encode(data: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + data.len());
        bytes.extend_from_slice(&(data.len() as u16).to_be_bytes());
        bytes.extend_from_slice(data);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<(Vec<u8>, usize), ParseError> {
        let (len, _) = TwoByteInteger::decode(bytes)?;
        let end = 2 + len as usize;
        if bytes.len() < end {
            return Err(ParseError::BufferTooShort);
        }
        Ok((bytes[2..end].to_vec(), end))
    }
}

pub struct Utf8String;

impl Utf8String {
    pub fn encode(s: &str) -> Vec<u8> {
        BinaryData::encode(s.as_bytes())
    }

    pub fn decode(bytes: &[u8]) -> Result<(String, usize), ParseError> {
        let (data, len) = BinaryData::decode(bytes)?;
        let s = String::from_utf8(data).map_err(|e| ParseError::Utf8(e.utf8_error()))?;
        Ok((s, len))
    }
}
