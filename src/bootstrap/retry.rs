use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::config::BrokerSettings;

/// Where the broker connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Retry budget spent; nothing reconnects automatically any more.
    Exhausted,
}

impl ConnectionState {
    /// True once an attempt has resolved one way or the other.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::Reconnecting | ConnectionState::Exhausted
        )
    }
}

/// How often and how patiently the supervisor redials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Lifetime number of retries after failed connect attempts.
    pub retries: u32,
    /// Fixed pause before every redial.
    pub delay: Duration,
    /// Upper bound on a single connect attempt. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn from_settings(settings: &BrokerSettings) -> Self {
        Self {
            retries: settings.retries,
            delay: Duration::from_millis(settings.delay),
            timeout: settings.timeout.map(Duration::from_millis),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            delay: Duration::from_millis(3000),
            timeout: None,
        }
    }
}

/// Counter of retries left. Only ever goes down.
#[derive(Debug)]
pub struct RetryBudget {
    remaining: AtomicU32,
}

impl RetryBudget {
    pub fn new(retries: u32) -> Self {
        Self {
            remaining: AtomicU32::new(retries),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Spends one retry. Returns `false` when the budget was already empty.
    pub fn try_consume(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}
