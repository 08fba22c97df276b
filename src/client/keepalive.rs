// SPDX-License-Identifier: MPL-2.0

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing::{trace, warn};

use crate::client::error::ClientError;
use crate::client::io::{Activity, FrameWriter};
use crate::codec::packet::ControlPacket;
use crate::codec::ping::PingReq;

/// Grace factor: a link with no inbound traffic for this many ping
/// intervals is declared dead.
const DEAD_AFTER_INTERVALS: u32 = 4;

/// Per-link keepalive task. Wakes every `interval`, checks for broker
/// silence, and otherwise sends PINGREQ. Reports through `failures` and
/// exits on any problem; the supervisor handles the teardown.
pub(crate) struct KeepAlive {
    pub(crate) interval: Duration,
    pub(crate) writer: Arc<Mutex<FrameWriter>>,
    pub(crate) activity: Arc<Activity>,
    pub(crate) failures: mpsc::Sender<ClientError>,
}

impl KeepAlive {
    pub(crate) async fn run(self) {
        let ping = match PingReq.encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = self.failures.send(ClientError::Encoding(err)).await;
                return;
            }
        };
        let dead_after = self.interval * DEAD_AFTER_INTERVALS;

        loop {
            sleep(self.interval).await;

            let idle = self.activity.idle_for();
            if idle >= dead_after {
                warn!(idle_ms = idle.as_millis() as u64, "broker silent, declaring link dead");
                let _ = self
                    .failures
                    .send(ClientError::Timeout {
                        operation: "broker traffic",
                        timeout: dead_after,
                    })
                    .await;
                return;
            }

            trace!("pingreq");
            if let Err(err) = self.writer.lock().await.write_frame(&ping).await {
                let _ = self.failures.send(err).await;
                return;
            }
        }
    }
}
