//! Broker connection supervisor
//!
//! Runs the reconnect state machine as one background task:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Reconnecting -> Connecting -> ...
//!                     |
//!                     +-- failure, budget left  -> Reconnecting
//!                     +-- failure, budget spent -> Exhausted
//! ```
//!
//! An error or close reported by a live connection always leads back to
//! `Reconnecting` and does not touch the budget; only failed connect attempts
//! spend it. Redials wait a fixed delay. Once `Exhausted`, the task ends and
//! the broker stays down until the process is restarted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bootstrap::retry::{ConnectionState, RetryBudget, RetryPolicy};
use crate::broker::{BrokerClient, Connection, ConnectionEvent};
use crate::utils::error::BrokerError;

pub struct BrokerSupervisor {
    client: Arc<BrokerClient>,
    uri: String,
    policy: RetryPolicy,
    budget: RetryBudget,
    attempts: AtomicU64,
    state: watch::Sender<ConnectionState>,
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BrokerSupervisor {
    pub fn new(client: Arc<BrokerClient>, uri: impl Into<String>, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (stop, _) = watch::channel(false);
        Self {
            client,
            uri: uri.into(),
            budget: RetryBudget::new(policy.retries),
            policy,
            attempts: AtomicU64::new(0),
            state,
            stop,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn remaining_budget(&self) -> u32 {
        self.budget.remaining()
    }

    /// Connect attempts made so far, successful ones included.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Spawns the supervision task. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }
        *task = Some(tokio::spawn(Arc::clone(self).run()));
    }

    /// Waits until the attempt in progress has resolved, or until a stopped
    /// supervisor has gone back to `Disconnected`.
    pub async fn settled(&self) -> ConnectionState {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| {
                state.is_settled()
                    || (*state == ConnectionState::Disconnected && *self.stop.borrow())
            })
            .await
            .map(|s| *s);
        settled.unwrap_or_else(|_| self.state())
    }

    /// Stops supervising and closes the live connection, if any.
    pub async fn stop(&self) {
        self.stop.send_replace(true);
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn transition(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        match next {
            ConnectionState::Reconnecting | ConnectionState::Exhausted => {
                error!(from = ?previous, to = ?next, "Broker connection state changed")
            }
            _ => info!(from = ?previous, to = ?next, "Broker connection state changed"),
        }
    }

    async fn attempt(&self) -> Result<Connection, BrokerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.policy.timeout {
            Some(limit) => tokio::time::timeout(limit, self.client.connect(&self.uri))
                .await
                .map_err(|_| {
                    BrokerError::Timeout(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))
                })?,
            None => self.client.connect(&self.uri).await,
        }
    }

    async fn run(self: Arc<Self>) {
        let mut stop = self.stop.subscribe();

        loop {
            if *stop.borrow() {
                break;
            }

            self.transition(ConnectionState::Connecting);
            let attempt = tokio::select! {
                result = self.attempt() => Some(result),
                _ = stop.changed() => None,
            };
            let Some(attempt) = attempt else {
                break;
            };

            match attempt {
                Ok(mut connection) => {
                    info!(uri = %self.uri, "Connected to broker successfully");
                    self.transition(ConnectionState::Connected);

                    let stopped = tokio::select! {
                        event = connection.next_event() => {
                            match event {
                                ConnectionEvent::Error(reason) => {
                                    error!(%reason, "Connection to broker failed, reconnecting")
                                }
                                ConnectionEvent::Closed => {
                                    error!("Connection to broker closed, reconnecting")
                                }
                            }
                            false
                        }
                        _ = stop.changed() => true,
                    };

                    if stopped {
                        if let Err(e) = connection.close().await {
                            warn!("Failed to close broker connection: {e}");
                        }
                        break;
                    }
                }
                Err(e) => {
                    if self.budget.try_consume() {
                        error!(
                            remaining = self.budget.remaining(),
                            "Could not connect to the broker, retrying: {e}"
                        );
                    } else {
                        error!("Could not connect to the broker, giving up: {e}");
                        self.transition(ConnectionState::Exhausted);
                        return;
                    }
                }
            }

            self.transition(ConnectionState::Reconnecting);
            tokio::select! {
                _ = tokio::time::sleep(self.policy.delay) => {}
                _ = stop.changed() => break,
            }
        }

        self.transition(ConnectionState::Disconnected);
    }
}

impl std::fmt::Debug for BrokerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerSupervisor")
            .field("uri", &self.uri)
            .field("state", &self.state())
            .field("remaining_budget", &self.remaining_budget())
            .finish()
    }
}
