// SPDX-License-Identifier: MPL-2.0

//! Shared harness for the integration tests: a scripted transport factory
//! backed by in-memory duplex pipes, plus a minimal broker-side framer.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use labmq::codec::packet::{ControlPacket, Packet};
use labmq::{BoxedTransport, ClientConfig, TransportError, TransportFactory};

/// Hands out pre-wired duplex streams, one per connection attempt, then
/// fails every further attempt.
pub struct ScriptedFactory {
    streams: Mutex<VecDeque<DuplexStream>>,
}

impl ScriptedFactory {
    pub fn new(streams: Vec<DuplexStream>) -> Self {
        Self {
            streams: Mutex::new(streams.into_iter().collect()),
        }
    }
}

#[async_trait]
impl TransportFactory for ScriptedFactory {
    async fn connect(&self) -> Result<BoxedTransport, TransportError> {
        match self.streams.lock().unwrap().pop_front() {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(TransportError::Connect("no more scripted links".to_string())),
        }
    }
}

/// (client side, broker side)
pub fn link_pair() -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(4096)
}

pub fn test_config(client_id: &str) -> ClientConfig {
    ClientConfig::builder(client_id)
        // Keep pings far away from the timelines under test.
        .keep_alive(600)
        .response_timeout(Duration::from_secs(1))
        .reconnect_backoff(Duration::from_secs(1), Duration::from_secs(8))
        .build()
}

/// Reads one complete MQTT frame off the broker side of a pipe.
pub async fn read_frame(stream: &mut DuplexStream) -> Vec<u8> {
    let mut first = [0u8; 1];
    stream.read_exact(&mut first).await.unwrap();
    let mut frame = vec![first[0]];

    let mut remaining = 0usize;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await.unwrap();
        frame.push(byte[0]);
        remaining |= usize::from(byte[0] & 0x7F) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0u8; remaining];
    stream.read_exact(&mut body).await.unwrap();
    frame.extend_from_slice(&body);
    frame
}

pub async fn read_packet(stream: &mut DuplexStream) -> Packet {
    let frame = read_frame(stream).await;
    Packet::decode(&frame).unwrap().0
}

pub async fn write_packet(stream: &mut DuplexStream, packet: &impl ControlPacket) {
    stream.write_all(&packet.encode().unwrap()).await.unwrap();
}

/// Consumes the client's CONNECT and answers with an accepting CONNACK.
pub async fn accept_connect(stream: &mut DuplexStream) -> labmq::codec::connect::Connect {
    match read_packet(stream).await {
        Packet::Connect(connect) => {
            stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            connect
        }
        other => panic!("expected CONNECT, got {}", other.name()),
    }
}
