// SPDX-License-Identifier: MPL-2.0

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use tokio::sync::oneshot;

use crate::client::error::ClientError;

/// What an acknowledgement completed with.
#[derive(Debug)]
pub(crate) enum AckNotice {
    PubAck,
    SubAck(Vec<u8>),
    UnsubAck,
}

struct PendingInner {
    next_id: u16,
    waiting: HashMap<u16, oneshot::Sender<AckNotice>>,
}

/// Packet-id allocation and the registry of in-flight exchanges.
///
/// Ids wrap through 1..=65535, skipping ids still awaiting an ack. On link
/// teardown the registry is drained wholesale; dropping the senders wakes
/// every waiting caller, which observes [`ClientError::LinkDown`].
pub(crate) struct PendingAcks {
    inner: StdMutex<PendingInner>,
    republishes: AtomicU64,
}

impl PendingAcks {
    pub(crate) fn new() -> Self {
        Self {
            inner: StdMutex::new(PendingInner {
                next_id: 0,
                waiting: HashMap::new(),
            }),
            republishes: AtomicU64::new(0),
        }
    }

    /// Allocates a fresh packet id and registers a completion channel for it.
    pub(crate) fn register(&self) -> Result<(u16, oneshot::Receiver<AckNotice>), ClientError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ClientError::protocol("pending-ack registry poisoned"))?;
        for _ in 0..=u16::MAX {
            inner.next_id = inner.next_id.wrapping_add(1);
            if inner.next_id == 0 {
                inner.next_id = 1;
            }
            let id = inner.next_id;
            if !inner.waiting.contains_key(&id) {
                let (tx, rx) = oneshot::channel();
                inner.waiting.insert(id, tx);
                return Ok((id, rx));
            }
        }
        Err(ClientError::protocol("no free packet ids"))
    }

    /// Completes the exchange for `id`. An unknown id is a protocol
    /// violation; the broker acknowledged something we never sent.
    pub(crate) fn complete(&self, id: u16, notice: AckNotice) -> Result<(), ClientError> {
        let sender = {
            let mut inner = self
                .inner
                .lock()
                .map_err(|_| ClientError::protocol("pending-ack registry poisoned"))?;
            inner.waiting.remove(&id)
        };
        match sender {
            Some(tx) => {
                // The waiter may have given up already; that is not an error.
                let _ = tx.send(notice);
                Ok(())
            }
            None => Err(ClientError::Protocol {
                reason: format!("acknowledgement for unknown packet id {id}"),
            }),
        }
    }

    /// Drops the registration for `id` after the caller gave up on it.
    pub(crate) fn release(&self, id: u16) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.waiting.remove(&id);
        }
    }

    /// Drains every in-flight exchange; their waiters observe `LinkDown`.
    pub(crate) fn fail_all(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.waiting.clear();
        }
    }

    pub(crate) fn note_republish(&self) {
        self.republishes.fetch_add(1, Ordering::Relaxed);
    }

    /// Monotonic count of QoS 1 retransmissions since the client started.
    pub(crate) fn republish_count(&self) -> u64 {
        self.republishes.load(Ordering::Relaxed)
    }
}
