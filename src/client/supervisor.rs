// SPDX-License-Identifier: MPL-2.0

//! Connection supervision: the link moves between Down, Connecting and Up,
//! with Stopped reachable only through an explicit disconnect. On any
//! link-fatal error the supervisor aborts the per-link tasks, fails every
//! in-flight exchange, and retries forever with exponential backoff.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::client::config::ClientConfig;
use crate::client::dispatcher::Dispatcher;
use crate::client::error::ClientError;
use crate::client::io::{Activity, FrameReader, FrameWriter};
use crate::client::keepalive::KeepAlive;
use crate::client::message::MessageSink;
use crate::client::pending::PendingAcks;
use crate::client::session;
use crate::client::transport::TransportFactory;
use crate::codec::disconnect::Disconnect;
use crate::codec::packet::ControlPacket;

/// Externally visible link state, published through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// No usable link; the supervisor may be between reconnect attempts.
    Down,
    /// A transport is being acquired or the handshake is in flight.
    Connecting,
    /// Session established, operations may proceed.
    Up,
    /// Explicitly closed; terminal.
    Stopped,
}

/// State shared between the client handle, the supervisor, and the per-link
/// tasks.
pub(crate) struct Shared {
    /// Writer of the current link, `None` whenever the link is not up.
    pub(crate) writer: StdMutex<Option<Arc<Mutex<FrameWriter>>>>,
    pub(crate) pending: Arc<PendingAcks>,
    pub(crate) link: watch::Sender<LinkState>,
}

impl Shared {
    pub(crate) fn current_writer(&self) -> Result<Arc<Mutex<FrameWriter>>, ClientError> {
        self.writer
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or(ClientError::LinkDown)
    }
}

/// One established link, ready for supervision.
pub(crate) struct Link {
    pub(crate) reader: FrameReader,
    pub(crate) writer: FrameWriter,
    pub(crate) activity: Arc<Activity>,
}

/// Acquires a transport and runs the handshake.
pub(crate) async fn open_link(
    config: &ClientConfig,
    factory: &dyn TransportFactory,
    clean_session: bool,
) -> Result<Link, ClientError> {
    let transport = match timeout(config.response_timeout, factory.connect()).await {
        Err(_) => {
            return Err(ClientError::Timeout {
                operation: "transport connect",
                timeout: config.response_timeout,
            })
        }
        Ok(result) => result?,
    };

    let activity = Arc::new(Activity::new());
    let (read_half, write_half) = tokio::io::split(transport);
    let mut reader = FrameReader::new(read_half, config.response_timeout, activity.clone());
    let mut writer = FrameWriter::new(write_half, config.response_timeout);
    let negotiated = session::negotiate(&mut reader, &mut writer, config, clean_session).await?;
    if negotiated.session_present {
        info!("broker resumed an existing session");
    }
    Ok(Link {
        reader,
        writer,
        activity,
    })
}

pub(crate) struct Supervisor {
    pub(crate) config: ClientConfig,
    pub(crate) factory: Arc<dyn TransportFactory>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) sink: Arc<MessageSink>,
    pub(crate) failures_tx: mpsc::Sender<ClientError>,
    pub(crate) failures_rx: mpsc::Receiver<ClientError>,
    pub(crate) stop_rx: mpsc::Receiver<oneshot::Sender<()>>,
    pub(crate) tasks: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Supervision loop. The first link is installed by the caller before
    /// this task starts, so the loop begins in the connected state.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                failure = self.failures_rx.recv() => {
                    if let Some(err) = failure {
                        warn!(error = %err, "link failed");
                    }
                    self.teardown();
                }
                stop = self.stop_rx.recv() => {
                    self.send_disconnect().await;
                    self.teardown();
                    self.finish(stop);
                    return;
                }
            }

            let mut attempts = 0u32;
            loop {
                let delay = backoff_delay(&self.config, attempts);
                attempts = attempts.saturating_add(1);
                info!(delay_ms = delay.as_millis() as u64, attempt = attempts, "reconnect scheduled");
                tokio::select! {
                    _ = sleep(delay) => {}
                    stop = self.stop_rx.recv() => {
                        self.finish(stop);
                        return;
                    }
                }

                self.shared.link.send_replace(LinkState::Connecting);
                // Reconnects always request a clean session; only the
                // first connect honors the configured flag.
                match open_link(&self.config, self.factory.as_ref(), true).await {
                    Ok(link) => {
                        self.install(link);
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "reconnect attempt failed");
                        self.shared.link.send_replace(LinkState::Down);
                    }
                }
            }
        }
    }

    /// Publishes the link, spawns the per-link tasks, and flips state to Up.
    pub(crate) fn install(&mut self, link: Link) {
        let writer = Arc::new(Mutex::new(link.writer));
        if let Ok(mut slot) = self.shared.writer.lock() {
            *slot = Some(writer.clone());
        }

        // Failure reports from the previous link are stale by now.
        while self.failures_rx.try_recv().is_ok() {}

        let dispatcher = Dispatcher {
            reader: link.reader,
            writer: writer.clone(),
            pending: self.shared.pending.clone(),
            sink: self.sink.clone(),
            failures: self.failures_tx.clone(),
        };
        self.tasks.push(tokio::spawn(dispatcher.run()));

        if let Some(interval) = self.config.effective_ping_interval() {
            let keepalive = KeepAlive {
                interval,
                writer,
                activity: link.activity,
                failures: self.failures_tx.clone(),
            };
            self.tasks.push(tokio::spawn(keepalive.run()));
        }

        self.shared.link.send_replace(LinkState::Up);
        info!(client_id = %self.config.client_id, "link up");
    }

    /// Deterministic link teardown: abort the per-link tasks, drop the
    /// writer, fail every in-flight exchange, publish Down.
    fn teardown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Ok(mut slot) = self.shared.writer.lock() {
            *slot = None;
        }
        self.shared.pending.fail_all();
        self.shared.link.send_replace(LinkState::Down);
    }

    async fn send_disconnect(&self) {
        let (Ok(frame), Ok(writer)) = (Disconnect.encode(), self.shared.current_writer()) else {
            return;
        };
        // Best effort; the link is going away either way.
        let _ = writer.lock().await.write_frame(&frame).await;
    }

    fn finish(&mut self, stop: Option<oneshot::Sender<()>>) {
        self.shared.link.send_replace(LinkState::Stopped);
        info!(client_id = %self.config.client_id, "stopped");
        if let Some(done) = stop {
            let _ = done.send(());
        }
    }
}

/// Exponential backoff between the configured bounds, doubling per attempt
/// with the exponent capped to keep the shift defined.
fn backoff_delay(config: &ClientConfig, attempts: u32) -> Duration {
    let factor = 1u32 << attempts.min(10);
    config
        .reconnect_min
        .saturating_mul(factor)
        .min(config.reconnect_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = ClientConfig::builder("c")
            .reconnect_backoff(Duration::from_secs(1), Duration::from_secs(30))
            .build();
        assert_eq!(backoff_delay(&config, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(&config, 4), Duration::from_secs(16));
        assert_eq!(backoff_delay(&config, 5), Duration::from_secs(30));
        assert_eq!(backoff_delay(&config, 63), Duration::from_secs(30));
    }
}
