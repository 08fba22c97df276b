// SPDX-License-Identifier: MPL-2.0

use async_trait::async_trait;
use tokio::net::TcpStream;

use super::{BoxedTransport, TransportError, TransportFactory};

/// Plain TCP transport. NODELAY is on by default; MQTT control packets are
/// small and latency-sensitive.
#[derive(Debug, Clone)]
pub struct TcpFactory {
    addr: String,
    nodelay: bool,
}

impl TcpFactory {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            nodelay: true,
        }
    }

    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }
}

#[async_trait]
impl TransportFactory for TcpFactory {
    async fn connect(&self) -> Result<BoxedTransport, TransportError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {e}", self.addr)))?;
        stream.set_nodelay(self.nodelay)?;
        Ok(Box::new(stream))
    }
}
