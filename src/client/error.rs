// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

use thiserror::Error;

use crate::client::transport::TransportError;
use crate::codec::ParseError;

/// Public error taxonomy of the client.
///
/// Errors split into two families: link-fatal ones that cause the connection
/// supervisor to tear the link down and reconnect, and per-operation ones
/// that fail a single call while the link stays up.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An outbound packet could not be encoded. Caller-side bug, the link is
    /// untouched.
    #[error("encoding failed: {0}")]
    Encoding(ParseError),

    /// The broker sent something malformed or out of protocol, including an
    /// acknowledgement for a packet id we never sent.
    #[error("protocol violation: {reason}")]
    Protocol { reason: String },

    /// No broker response within the allotted window.
    #[error("timed out waiting for {operation} after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The peer closed the stream (clean EOF).
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The operation was aborted because the link went down, or was started
    /// while the link was not up.
    #[error("link is down")]
    LinkDown,

    /// The broker refused the CONNECT. Surfaced to the caller; the
    /// supervisor still keeps retrying on reconnect paths.
    #[error("broker refused connection, return code {return_code}")]
    Authentication { return_code: u8 },

    /// A QoS 1 publish exhausted its retransmission budget.
    #[error("publish {packet_id} unacknowledged after {attempts} retransmissions")]
    PublishFailed { packet_id: u16, attempts: u32 },

    /// A subscribe or unsubscribe was not acknowledged, or the broker
    /// refused the filter.
    #[error("subscription change for {topic:?} failed")]
    SubscribeFailed { topic: String },

    /// The broker used a protocol feature this client refuses to speak,
    /// currently only QoS 2 delivery.
    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ClientError {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        ClientError::Protocol {
            reason: reason.into(),
        }
    }

    /// Builds a protocol error carrying a short hex preview of the bytes
    /// that triggered it.
    pub(crate) fn protocol_with_bytes(reason: impl Into<String>, bytes: &[u8]) -> Self {
        let preview_len = bytes.len().min(16);
        let ellipsis = if bytes.len() > preview_len { ".." } else { "" };
        ClientError::Protocol {
            reason: format!(
                "{} [{}{}]",
                reason.into(),
                hex::encode(&bytes[..preview_len]),
                ellipsis
            ),
        }
    }

    /// Whether the supervisor must tear the link down over this error.
    pub fn is_fatal_for_link(&self) -> bool {
        matches!(
            self,
            ClientError::Protocol { .. }
                | ClientError::Unsupported(_)
                | ClientError::ConnectionClosed
                | ClientError::Transport(_)
                | ClientError::Timeout { .. }
        )
    }

    /// Whether retrying the same operation later can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout { .. }
                | ClientError::LinkDown
                | ClientError::PublishFailed { .. }
                | ClientError::SubscribeFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_preview_is_hex_truncated() {
        let err = ClientError::protocol_with_bytes("bad frame", &[0xAB; 20]);
        let msg = err.to_string();
        assert!(msg.contains("abababab"));
        assert!(msg.contains(".."));
    }

    #[test]
    fn fatal_classification() {
        assert!(ClientError::protocol("x").is_fatal_for_link());
        assert!(ClientError::Unsupported("QoS 2").is_fatal_for_link());
        assert!(ClientError::ConnectionClosed.is_fatal_for_link());
        assert!(!ClientError::LinkDown.is_fatal_for_link());
        assert!(!ClientError::PublishFailed {
            packet_id: 1,
            attempts: 3
        }
        .is_fatal_for_link());
    }

    #[test]
    fn recoverable_classification() {
        assert!(ClientError::LinkDown.is_recoverable());
        assert!(ClientError::SubscribeFailed {
            topic: "t".to_string()
        }
        .is_recoverable());
        assert!(!ClientError::Authentication { return_code: 5 }.is_recoverable());
        assert!(!ClientError::protocol("x").is_recoverable());
    }
}
