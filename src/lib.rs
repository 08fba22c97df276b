// SPDX-License-Identifier: MPL-2.0

//! Resilient MQTT v3.1.1 client for long-running lab-device telemetry links.
//!
//! The crate owns the full path from byte-level packet encoding up to
//! supervised automatic reconnection. QoS 0 and QoS 1 only; inbound QoS 2
//! traffic is treated as a protocol violation and tears the link down.
//!
//! ```no_run
//! use labmq::{ClientConfig, MqttClient, QoS, TcpFactory};
//!
//! # async fn demo() -> Result<(), labmq::ClientError> {
//! let config = ClientConfig::builder("bench-07").build();
//! let client = MqttClient::connect(config, TcpFactory::new("broker.lab:1883")).await?;
//! client.subscribe("lab/bench-07/cmd", QoS::AtLeastOnce).await?;
//! client.publish("lab/bench-07/state", b"ready", QoS::AtLeastOnce, false).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;

pub use client::config::{ClientConfig, ClientConfigBuilder, QoS};
pub use client::error::ClientError;
pub use client::message::{InboundMessage, MessageBuffer, MessageSink};
pub use client::LinkState;
pub use client::transport::{BoxedTransport, TcpFactory, Transport, TransportError, TransportFactory};
#[cfg(feature = "tls")]
pub use client::transport::tls::TlsFactory;
pub use client::MqttClient;
pub use codec::connect::Will;
