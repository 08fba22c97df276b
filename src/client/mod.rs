// SPDX-License-Identifier: MPL-2.0

//! Async MQTT v3.1.1 client built around a supervised connection.
//!
//! [`MqttClient::connect`] performs the first handshake in the caller so
//! authentication failures surface directly, then hands the link to a
//! background supervisor that reconnects forever until [`MqttClient::disconnect`].

pub mod config;
pub mod error;
pub mod message;
pub mod transport;

mod dispatcher;
mod io;
mod keepalive;
mod pending;
mod session;
mod supervisor;

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::debug;

use crate::codec::packet::ControlPacket;
use crate::codec::publish::Publish;
use crate::codec::suback::SUBACK_FAILURE;
use crate::codec::subscribe::Subscribe;
use crate::codec::unsubscribe::Unsubscribe;

use config::{ClientConfig, QoS};
use error::ClientError;
use message::{InboundMessage, MessageBuffer, MessageSink};
use pending::{AckNotice, PendingAcks};
use supervisor::{open_link, Shared, Supervisor};
use transport::TransportFactory;

pub use supervisor::LinkState;

/// Handle to a supervised MQTT session.
///
/// Dropping the handle without calling [`disconnect`](Self::disconnect)
/// closes the stop channel, which the supervisor treats as a disconnect
/// request.
pub struct MqttClient {
    config: ClientConfig,
    shared: Arc<Shared>,
    sink: Arc<MessageSink>,
    link_rx: watch::Receiver<LinkState>,
    stop_tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl MqttClient {
    /// Connects with inbound messages going to a bounded ring buffer of
    /// `config.sink_capacity`, drained via [`recv`](Self::recv).
    pub async fn connect(
        config: ClientConfig,
        factory: impl TransportFactory,
    ) -> Result<Self, ClientError> {
        let capacity = config.sink_capacity;
        Self::connect_inner(config, Arc::new(factory), Arc::new(MessageSink::buffer(capacity))).await
    }

    /// Connects with inbound messages handed to `callback` on the dispatcher
    /// task. The callback must not block.
    pub async fn connect_with_callback(
        config: ClientConfig,
        factory: impl TransportFactory,
        callback: impl Fn(InboundMessage) + Send + Sync + 'static,
    ) -> Result<Self, ClientError> {
        Self::connect_inner(
            config,
            Arc::new(factory),
            Arc::new(MessageSink::Callback(Box::new(callback))),
        )
        .await
    }

    async fn connect_inner(
        config: ClientConfig,
        factory: Arc<dyn TransportFactory>,
        sink: Arc<MessageSink>,
    ) -> Result<Self, ClientError> {
        let (link_tx, link_rx) = watch::channel(LinkState::Down);
        let shared = Arc::new(Shared {
            writer: StdMutex::new(None),
            pending: Arc::new(PendingAcks::new()),
            link: link_tx,
        });

        // The first connect runs here so the caller sees handshake errors
        // directly; only after it succeeds does supervision begin.
        shared.link.send_replace(LinkState::Connecting);
        let link = match open_link(&config, factory.as_ref(), config.clean_session).await {
            Ok(link) => link,
            Err(err) => {
                shared.link.send_replace(LinkState::Down);
                return Err(err);
            }
        };

        let (failures_tx, failures_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let mut supervisor = Supervisor {
            config: config.clone(),
            factory,
            shared: shared.clone(),
            sink: sink.clone(),
            failures_tx,
            failures_rx,
            stop_rx,
            tasks: Vec::new(),
        };
        // Install before spawning: the link must be usable the moment this
        // function returns, not whenever the supervisor task gets scheduled.
        supervisor.install(link);
        tokio::spawn(supervisor.run());

        Ok(Self {
            config,
            shared,
            sink,
            link_rx,
            stop_tx,
        })
    }

    /// Publishes a message. QoS 0 returns once the frame is written. QoS 1
    /// blocks until the broker acknowledges, re-sending with DUP up to
    /// `max_republish` times before failing with
    /// [`ClientError::PublishFailed`].
    pub async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), ClientError> {
        match qos {
            QoS::AtMostOnce => {
                let mut packet = Publish::new(topic, payload.to_vec());
                packet.retain = retain;
                let frame = packet.encode().map_err(ClientError::Encoding)?;
                let writer = self.shared.current_writer()?;
                let mut writer = writer.lock().await;
                writer.write_frame(&frame).await
            }
            QoS::AtLeastOnce => self.publish_qos1(topic, payload, retain).await,
        }
    }

    async fn publish_qos1(&self, topic: &str, payload: &[u8], retain: bool) -> Result<(), ClientError> {
        let (packet_id, mut ack) = self.shared.pending.register()?;
        let mut attempts = 0u32; // retransmissions so far

        loop {
            let mut packet = Publish::with_qos1(topic, payload.to_vec(), packet_id);
            packet.retain = retain;
            packet.dup = attempts > 0;
            let frame = match packet.encode() {
                Ok(frame) => frame,
                Err(err) => {
                    self.shared.pending.release(packet_id);
                    return Err(ClientError::Encoding(err));
                }
            };

            let writer = match self.shared.current_writer() {
                Ok(writer) => writer,
                Err(err) => {
                    self.shared.pending.release(packet_id);
                    return Err(err);
                }
            };
            if let Err(err) = writer.lock().await.write_frame(&frame).await {
                self.shared.pending.release(packet_id);
                return Err(err);
            }

            match timeout(self.config.response_timeout, &mut ack).await {
                Ok(Ok(AckNotice::PubAck)) => return Ok(()),
                Ok(Ok(_)) => {
                    self.shared.pending.release(packet_id);
                    return Err(ClientError::protocol("wrong acknowledgement type for PUBLISH"));
                }
                // Sender dropped: the link was torn down under us.
                Ok(Err(_)) => return Err(ClientError::LinkDown),
                Err(_) => {
                    if attempts >= self.config.max_republish {
                        self.shared.pending.release(packet_id);
                        return Err(ClientError::PublishFailed {
                            packet_id,
                            attempts,
                        });
                    }
                    attempts += 1;
                    self.shared.pending.note_republish();
                    debug!(packet_id, attempts, "republishing with DUP");
                }
            }
        }
    }

    /// Subscribes to a single filter and returns the granted QoS. One
    /// attempt only; a timeout or broker refusal fails with
    /// [`ClientError::SubscribeFailed`].
    pub async fn subscribe(&self, filter: &str, qos: QoS) -> Result<QoS, ClientError> {
        let (packet_id, ack) = self.shared.pending.register()?;
        let packet = Subscribe::single(packet_id, filter, qos.bits());
        let frame = match packet.encode() {
            Ok(frame) => frame,
            Err(err) => {
                self.shared.pending.release(packet_id);
                return Err(ClientError::Encoding(err));
            }
        };

        let writer = match self.shared.current_writer() {
            Ok(writer) => writer,
            Err(err) => {
                self.shared.pending.release(packet_id);
                return Err(err);
            }
        };
        if let Err(err) = writer.lock().await.write_frame(&frame).await {
            self.shared.pending.release(packet_id);
            return Err(err);
        }

        match timeout(self.config.response_timeout, ack).await {
            Ok(Ok(AckNotice::SubAck(codes))) => match codes.first() {
                Some(&code) if code != SUBACK_FAILURE => QoS::from_bits(code).ok_or_else(|| {
                    ClientError::protocol("SUBACK granted an unsupported QoS")
                }),
                _ => Err(ClientError::SubscribeFailed {
                    topic: filter.to_string(),
                }),
            },
            Ok(Ok(_)) => Err(ClientError::protocol(
                "wrong acknowledgement type for SUBSCRIBE",
            )),
            Ok(Err(_)) => Err(ClientError::LinkDown),
            Err(_) => {
                self.shared.pending.release(packet_id);
                Err(ClientError::SubscribeFailed {
                    topic: filter.to_string(),
                })
            }
        }
    }

    /// Removes a subscription. Single attempt, like subscribe.
    pub async fn unsubscribe(&self, filter: &str) -> Result<(), ClientError> {
        let (packet_id, ack) = self.shared.pending.register()?;
        let packet = Unsubscribe::single(packet_id, filter);
        let frame = match packet.encode() {
            Ok(frame) => frame,
            Err(err) => {
                self.shared.pending.release(packet_id);
                return Err(ClientError::Encoding(err));
            }
        };

        let writer = match self.shared.current_writer() {
            Ok(writer) => writer,
            Err(err) => {
                self.shared.pending.release(packet_id);
                return Err(err);
            }
        };
        if let Err(err) = writer.lock().await.write_frame(&frame).await {
            self.shared.pending.release(packet_id);
            return Err(err);
        }

        match timeout(self.config.response_timeout, ack).await {
            Ok(Ok(AckNotice::UnsubAck)) => Ok(()),
            Ok(Ok(_)) => Err(ClientError::protocol(
                "wrong acknowledgement type for UNSUBSCRIBE",
            )),
            Ok(Err(_)) => Err(ClientError::LinkDown),
            Err(_) => {
                self.shared.pending.release(packet_id);
                Err(ClientError::SubscribeFailed {
                    topic: filter.to_string(),
                })
            }
        }
    }

    /// Sends DISCONNECT, stops the supervisor, and waits for it to finish.
    /// The client is unusable afterwards.
    pub async fn disconnect(self) -> Result<(), ClientError> {
        let (done_tx, done_rx) = oneshot::channel();
        if self.stop_tx.send(done_tx).await.is_ok() {
            let _ = done_rx.await;
        }
        Ok(())
    }

    pub fn state(&self) -> LinkState {
        *self.link_rx.borrow()
    }

    /// Watch receiver for link state transitions.
    pub fn state_changes(&self) -> watch::Receiver<LinkState> {
        self.link_rx.clone()
    }

    /// The ring buffer holding inbound messages, if this client was built
    /// with one.
    pub fn buffer(&self) -> Option<Arc<MessageBuffer>> {
        match self.sink.as_ref() {
            MessageSink::Buffer(buffer) => Some(buffer.clone()),
            MessageSink::Callback(_) => None,
        }
    }

    /// Waits for the next inbound message. Fails immediately when a callback
    /// sink is installed.
    pub async fn recv(&self) -> Result<InboundMessage, ClientError> {
        match self.sink.as_ref() {
            MessageSink::Buffer(buffer) => Ok(buffer.pop().await),
            MessageSink::Callback(_) => Err(ClientError::Unsupported("recv with a callback sink")),
        }
    }

    pub fn try_recv(&self) -> Option<InboundMessage> {
        self.buffer().and_then(|buffer| buffer.try_pop())
    }

    /// Messages evicted from the ring buffer so far.
    pub fn discarded(&self) -> u64 {
        self.buffer().map(|buffer| buffer.discarded()).unwrap_or(0)
    }

    /// Monotonic count of QoS 1 retransmissions, for instrumentation.
    pub fn republish_count(&self) -> u64 {
        self.shared.pending.republish_count()
    }
}

impl fmt::Debug for MqttClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttClient")
            .field("client_id", &self.config.client_id)
            .field("state", &self.state())
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}
