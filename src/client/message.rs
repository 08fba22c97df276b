// SPDX-License-Identifier: MPL-2.0

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::client::config::QoS;

/// An application message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
}

/// Where inbound messages go. Chosen once at client construction.
pub enum MessageSink {
    /// Invoked inline on the dispatcher task. Must not block.
    Callback(Box<dyn Fn(InboundMessage) + Send + Sync>),
    /// Bounded ring buffer drained by the application.
    Buffer(Arc<MessageBuffer>),
}

impl MessageSink {
    pub fn buffer(capacity: usize) -> Self {
        MessageSink::Buffer(Arc::new(MessageBuffer::new(capacity)))
    }

    pub(crate) fn deliver(&self, message: InboundMessage) {
        match self {
            MessageSink::Callback(callback) => callback(message),
            MessageSink::Buffer(buffer) => buffer.push(message),
        }
    }
}

impl fmt::Debug for MessageSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSink::Callback(_) => f.write_str("MessageSink::Callback"),
            MessageSink::Buffer(b) => f
                .debug_struct("MessageSink::Buffer")
                .field("capacity", &b.capacity)
                .finish(),
        }
    }
}

/// Bounded FIFO of inbound messages. When full, the oldest message is
/// evicted and counted rather than blocking the dispatcher.
pub struct MessageBuffer {
    queue: StdMutex<VecDeque<InboundMessage>>,
    capacity: usize,
    discarded: AtomicU64,
    notify: Notify,
}

impl MessageBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: StdMutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            discarded: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    pub(crate) fn push(&self, message: InboundMessage) {
        if let Ok(mut queue) = self.queue.lock() {
            if queue.len() == self.capacity {
                queue.pop_front();
                self.discarded.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(message);
        }
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<InboundMessage> {
        self.queue.lock().ok()?.pop_front()
    }

    /// Waits until a message is available.
    pub async fn pop(&self) -> InboundMessage {
        loop {
            let notified = self.notify.notified();
            if let Some(message) = self.try_pop() {
                return message;
            }
            notified.await;
        }
    }

    /// How many messages have been evicted because the buffer was full.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
