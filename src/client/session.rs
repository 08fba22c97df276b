// SPDX-License-Identifier: MPL-2.0

use tokio::time::timeout;
use tracing::debug;

use crate::client::config::ClientConfig;
use crate::client::error::ClientError;
use crate::client::io::{FrameReader, FrameWriter};
use crate::codec::connect::Connect;
use crate::codec::packet::{ControlPacket, Packet};

#[derive(Debug)]
pub(crate) struct Negotiated {
    pub(crate) session_present: bool,
}

/// Runs the CONNECT/CONNACK handshake on a freshly opened stream.
///
/// `clean_session` is passed in rather than read from the config because
/// only the first connect honors the configured flag; reconnects always
/// request a clean session.
pub(crate) async fn negotiate(
    reader: &mut FrameReader,
    writer: &mut FrameWriter,
    config: &ClientConfig,
    clean_session: bool,
) -> Result<Negotiated, ClientError> {
    let connect = Connect {
        clean_session,
        keep_alive: config.keep_alive,
        client_id: config.client_id.clone(),
        will: config.will.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
    };
    let frame = connect.encode().map_err(ClientError::Encoding)?;
    writer.write_frame(&frame).await?;

    let reply = match timeout(config.response_timeout, reader.read_frame()).await {
        Err(_) => {
            return Err(ClientError::Timeout {
                operation: "CONNACK",
                timeout: config.response_timeout,
            })
        }
        Ok(result) => result?,
    };

    let (packet, _) = Packet::decode(&reply)
        .map_err(|e| ClientError::protocol_with_bytes(format!("bad CONNACK: {e}"), &reply))?;
    match packet {
        Packet::ConnAck(ack) if ack.is_accepted() => {
            debug!(
                client_id = %config.client_id,
                session_present = ack.session_present,
                clean_session,
                "session established"
            );
            Ok(Negotiated {
                session_present: ack.session_present,
            })
        }
        Packet::ConnAck(ack) => Err(ClientError::Authentication {
            return_code: ack.return_code,
        }),
        other => Err(ClientError::Protocol {
            reason: format!("expected CONNACK, got {}", other.name()),
        }),
    }
}
