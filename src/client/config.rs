// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::connect::Will;

/// Delivery guarantee for a publish or subscription. QoS 2 is deliberately
/// absent; this client does not speak the exactly-once flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
}

impl QoS {
    pub fn bits(self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
        }
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            _ => None,
        }
    }
}

/// Everything the client needs to run one broker relationship. Constructed
/// once through [`ClientConfig::builder`]; there is no global state.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    /// Keep-alive interval in seconds as sent in CONNECT; 0 disables the
    /// keepalive supervisor entirely.
    pub keep_alive: u16,
    /// Clean-session flag for the *first* connect only. Some firmware stacks
    /// ran a clean connect/disconnect dance to flush broker state before the
    /// real session; here that collapses into this single flag. Every
    /// automatic reconnect always requests a clean session.
    pub clean_session: bool,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
    pub will: Option<Will>,
    /// How long to wait for any single broker response (CONNACK, PUBACK,
    /// SUBACK, UNSUBACK) before treating the exchange as timed out.
    pub response_timeout: Duration,
    /// How many times a QoS 1 publish is re-sent with DUP before failing.
    pub max_republish: u32,
    /// Override for the ping cadence; defaults to a quarter of `keep_alive`.
    pub ping_interval: Option<Duration>,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
    /// Capacity of the inbound ring buffer when no callback sink is used.
    pub sink_capacity: usize,
}

impl ClientConfig {
    pub fn builder(client_id: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                client_id: client_id.into(),
                keep_alive: 60,
                clean_session: true,
                username: None,
                password: None,
                will: None,
                response_timeout: Duration::from_secs(10),
                max_republish: 4,
                ping_interval: None,
                reconnect_min: Duration::from_secs(1),
                reconnect_max: Duration::from_secs(120),
                sink_capacity: 64,
            },
        }
    }

    /// Ping cadence actually used: the configured override clamped between
    /// one second and `keep_alive`, or `keep_alive / 4` by default. `None`
    /// when keepalive is disabled.
    pub(crate) fn effective_ping_interval(&self) -> Option<Duration> {
        if self.keep_alive == 0 {
            return None;
        }
        let keep_alive = Duration::from_secs(u64::from(self.keep_alive));
        let interval = self.ping_interval.unwrap_or(keep_alive / 4);
        Some(interval.clamp(Duration::from_secs(1), keep_alive))
    }
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn keep_alive(mut self, secs: u16) -> Self {
        self.config.keep_alive = secs;
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.config.clean_session = clean;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<Vec<u8>>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    pub fn will(mut self, will: Will) -> Self {
        self.config.will = Some(will);
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    pub fn max_republish(mut self, attempts: u32) -> Self {
        self.config.max_republish = attempts;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = Some(interval);
        self
    }

    pub fn reconnect_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.config.reconnect_min = min;
        self.config.reconnect_max = max.max(min);
        self
    }

    pub fn sink_capacity(mut self, capacity: usize) -> Self {
        self.config.sink_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
