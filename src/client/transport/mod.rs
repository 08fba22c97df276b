// SPDX-License-Identifier: MPL-2.0

//! Pluggable byte-stream transports. The client never opens sockets itself;
//! it asks a [`TransportFactory`] for a fresh stream on every (re)connect,
//! which is also how tests wire in in-memory duplex pipes.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod tcp;
#[cfg(feature = "tls")]
pub mod tls;

pub use tcp::TcpFactory;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect failed: {0}")]
    Connect(String),

    #[cfg(feature = "tls")]
    #[error("tls error: {0}")]
    Tls(#[from] native_tls::Error),
}

/// Any full-duplex byte stream the client can run MQTT over.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

pub type BoxedTransport = Box<dyn Transport>;

/// Produces a fresh connected stream for each connection attempt.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn connect(&self) -> Result<BoxedTransport, TransportError>;
}
