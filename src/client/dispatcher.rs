// SPDX-License-Identifier: MPL-2.0

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace, warn};

use crate::client::config::QoS;
use crate::client::error::ClientError;
use crate::client::io::{FrameReader, FrameWriter};
use crate::client::message::{InboundMessage, MessageSink};
use crate::client::pending::{AckNotice, PendingAcks};
use crate::codec::packet::{ControlPacket, Packet};
use crate::codec::puback::PubAck;
use crate::codec::publish::Publish;

/// Per-link inbound loop: reads frames, completes pending exchanges, and
/// delivers application messages. Any error ends the loop and is reported to
/// the connection supervisor, which tears the link down.
pub(crate) struct Dispatcher {
    pub(crate) reader: FrameReader,
    pub(crate) writer: Arc<Mutex<FrameWriter>>,
    pub(crate) pending: Arc<PendingAcks>,
    pub(crate) sink: Arc<MessageSink>,
    pub(crate) failures: mpsc::Sender<ClientError>,
}

impl Dispatcher {
    pub(crate) async fn run(mut self) {
        loop {
            if let Err(err) = self.step().await {
                debug!(error = %err, "dispatcher stopping");
                let _ = self.failures.send(err).await;
                return;
            }
        }
    }

    async fn step(&mut self) -> Result<(), ClientError> {
        let frame = self.reader.read_frame().await?;
        let (packet, _) = Packet::decode(&frame)
            .map_err(|e| ClientError::protocol_with_bytes(format!("undecodable frame: {e}"), &frame))?;
        trace!(packet = packet.name(), "inbound");

        match packet {
            Packet::Publish(publish) => self.handle_publish(publish).await,
            Packet::PubAck(ack) => self.pending.complete(ack.packet_id, AckNotice::PubAck),
            Packet::SubAck(ack) => self
                .pending
                .complete(ack.packet_id, AckNotice::SubAck(ack.return_codes)),
            Packet::UnsubAck(ack) => self.pending.complete(ack.packet_id, AckNotice::UnsubAck),
            Packet::PingResp(_) => Ok(()),
            other => Err(ClientError::Protocol {
                reason: format!("unexpected {} from broker", other.name()),
            }),
        }
    }

    async fn handle_publish(&mut self, publish: Publish) -> Result<(), ClientError> {
        if publish.qos == 2 {
            warn!(topic = %publish.topic, "broker attempted QoS 2 delivery");
            return Err(ClientError::Unsupported("QoS 2 delivery"));
        }

        // Ack before delivery: a slow consumer must not stall the
        // at-least-once acknowledgement.
        if publish.qos == 1 {
            let packet_id = publish
                .packet_id
                .ok_or_else(|| ClientError::protocol("QoS 1 PUBLISH without packet id"))?;
            let ack = PubAck::new(packet_id)
                .encode()
                .map_err(ClientError::Encoding)?;
            self.writer.lock().await.write_frame(&ack).await?;
        }

        let qos = QoS::from_bits(publish.qos)
            .ok_or_else(|| ClientError::protocol("PUBLISH QoS bits out of range"))?;
        self.sink.deliver(InboundMessage {
            topic: publish.topic,
            payload: publish.payload,
            qos,
            retain: publish.retain,
            dup: publish.dup,
        });
        Ok(())
    }
}
