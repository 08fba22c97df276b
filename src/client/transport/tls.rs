// SPDX-License-Identifier: MPL-2.0

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;

use super::{BoxedTransport, TransportError, TransportFactory};

/// TLS transport over TCP. Certificate validation stays with `native-tls`;
/// this layer only carries the knobs through.
#[derive(Debug, Clone)]
pub struct TlsFactory {
    addr: String,
    domain: String,
    accept_invalid_certs: bool,
    accept_invalid_hostnames: bool,
}

impl TlsFactory {
    pub fn new(addr: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            domain: domain.into(),
            accept_invalid_certs: false,
            accept_invalid_hostnames: false,
        }
    }

    /// Accept self-signed certificates. Only sensible against bench-local
    /// brokers.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn danger_accept_invalid_hostnames(mut self, accept: bool) -> Self {
        self.accept_invalid_hostnames = accept;
        self
    }
}

#[async_trait]
impl TransportFactory for TlsFactory {
    async fn connect(&self) -> Result<BoxedTransport, TransportError> {
        let tcp = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {e}", self.addr)))?;
        tcp.set_nodelay(true)?;

        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .danger_accept_invalid_hostnames(self.accept_invalid_hostnames)
            .build()?;
        let stream = TlsConnector::from(connector)
            .connect(&self.domain, tcp)
            .await
            .map_err(|e| TransportError::Connect(format!("tls handshake: {e}")))?;
        Ok(Box::new(stream))
    }
}
