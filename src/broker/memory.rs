//! In-process broker
//!
//! `MemoryBroker` implements `Transport` entirely in memory. It keeps the
//! parts of broker behaviour the client and the supervisor depend on:
//! - named queues holding ready messages until a consumer shows up
//! - round-robin delivery across the consumers of a queue
//! - per-channel delivery tags and unacked bookkeeping
//! - requeueing of unacked messages when their channel goes away
//!
//! It also exposes fault injection (`fail_next_connects`, `sever`) so the
//! reconnect path can be driven without a real broker. Clones share state.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::broker::transport::{
    Channel, Connection, ConnectionEvent, ConnectionHandle, Delivery, DeliveryStream, Transport,
};
use crate::utils::error::BrokerError;

type DeliverySender = mpsc::UnboundedSender<Result<Delivery, BrokerError>>;

#[derive(Clone)]
struct ConsumerSlot {
    channel: u64,
    sender: DeliverySender,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Vec<u8>>,
    consumers: Vec<ConsumerSlot>,
    cursor: usize,
}

struct ChannelState {
    connection: u64,
    next_tag: u64,
    unacked: HashMap<u64, (String, Vec<u8>)>,
}

struct ConnectionState {
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    channels: HashMap<u64, ChannelState>,
    connections: HashMap<u64, ConnectionState>,
    next_id: u64,
    fail_next: u32,
    attempts: u64,
}

impl BrokerState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Hands ready messages of `queue` to its live consumers.
    fn dispatch(&mut self, queue: &str) {
        loop {
            let Some(state) = self.queues.get_mut(queue) else {
                return;
            };
            state.consumers.retain(|c| !c.sender.is_closed());
            if state.consumers.is_empty() || state.ready.is_empty() {
                return;
            }

            let index = state.cursor % state.consumers.len();
            state.cursor = state.cursor.wrapping_add(1);
            let Some(consumer) = state.consumers.get(index).cloned() else {
                return;
            };
            let Some(payload) = state.ready.pop_front() else {
                return;
            };

            let Some(channel) = self.channels.get_mut(&consumer.channel) else {
                state.ready.push_front(payload);
                state.consumers.retain(|c| c.channel != consumer.channel);
                continue;
            };

            channel.next_tag += 1;
            let tag = channel.next_tag;
            channel
                .unacked
                .insert(tag, (queue.to_string(), payload.clone()));

            if consumer.sender.send(Ok(Delivery { tag, payload })).is_err() {
                if let Some((_, payload)) = channel.unacked.remove(&tag) {
                    state.ready.push_front(payload);
                }
            }
        }
    }

    /// Drops a channel, returning its unacked messages to their queues in
    /// delivery order and ending its consumers.
    fn close_channel(&mut self, id: u64) {
        let Some(channel) = self.channels.remove(&id) else {
            return;
        };

        let mut unacked: Vec<_> = channel.unacked.into_iter().collect();
        unacked.sort_by_key(|(tag, _)| *tag);

        let mut touched: Vec<String> = Vec::new();
        for (_, (queue, payload)) in unacked.into_iter().rev() {
            self.queues
                .entry(queue.clone())
                .or_default()
                .ready
                .push_front(payload);
            if !touched.contains(&queue) {
                touched.push(queue);
            }
        }

        for state in self.queues.values_mut() {
            state.consumers.retain(|c| c.channel != id);
        }

        for queue in touched {
            self.dispatch(&queue);
        }
    }

    fn drop_connection(&mut self, id: u64, event: ConnectionEvent) {
        let channels: Vec<u64> = self
            .channels
            .iter()
            .filter(|(_, c)| c.connection == id)
            .map(|(channel_id, _)| *channel_id)
            .collect();
        for channel in channels {
            self.close_channel(channel);
        }

        if let Some(connection) = self.connections.remove(&id) {
            let _ = connection.events.send(event);
        }
    }
}

/// An in-memory broker usable wherever a `Transport` is expected.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `count` connect attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.state().fail_next = count;
    }

    /// Fails every live connection with `reason`, as a network drop would.
    pub fn sever(&self, reason: &str) {
        let mut state = self.state();
        let ids: Vec<u64> = state.connections.keys().copied().collect();
        for id in ids {
            state.drop_connection(id, ConnectionEvent::Error(reason.to_string()));
        }
    }

    /// Number of connect attempts seen so far, failed ones included.
    pub fn connect_attempts(&self) -> u64 {
        self.state().attempts
    }

    pub fn live_connections(&self) -> usize {
        self.state().connections.len()
    }

    /// Messages waiting in `queue` for a consumer.
    pub fn ready_count(&self, queue: &str) -> usize {
        self.state()
            .queues
            .get(queue)
            .map_or(0, |q| q.ready.len())
    }

    /// Delivered but unacknowledged messages across all open channels.
    pub fn unacked_count(&self) -> usize {
        self.state().channels.values().map(|c| c.unacked.len()).sum()
    }
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn connect(&self, uri: &str) -> Result<Connection, BrokerError> {
        let mut state = self.state();
        state.attempts += 1;

        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(BrokerError::Connection(format!(
                "connection refused: {uri}"
            )));
        }

        let id = state.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .connections
            .insert(id, ConnectionState { events: tx });
        debug!(connection = id, "Memory broker accepted connection");

        Ok(Connection::new(
            MemoryConnection {
                broker: self.clone(),
                id,
            },
            rx,
        ))
    }
}

struct MemoryConnection {
    broker: MemoryBroker,
    id: u64,
}

#[async_trait]
impl ConnectionHandle for MemoryConnection {
    async fn create_channel(&self) -> Result<Arc<dyn Channel>, BrokerError> {
        let mut state = self.broker.state();
        if !state.connections.contains_key(&self.id) {
            return Err(BrokerError::Channel("connection is closed".to_string()));
        }

        let id = state.next_id();
        state.channels.insert(
            id,
            ChannelState {
                connection: self.id,
                next_tag: 0,
                unacked: HashMap::new(),
            },
        );

        Ok(Arc::new(MemoryChannel {
            broker: self.broker.clone(),
            id,
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.broker
            .state()
            .drop_connection(self.id, ConnectionEvent::Closed);
        Ok(())
    }
}

struct MemoryChannel {
    broker: MemoryBroker,
    id: u64,
}

impl MemoryChannel {
    fn ensure_open(&self, state: &BrokerState) -> Result<(), BrokerError> {
        if state.channels.contains_key(&self.id) {
            Ok(())
        } else {
            Err(BrokerError::Channel("channel is closed".to_string()))
        }
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        let mut state = self.broker.state();
        self.ensure_open(&state)?;
        state.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn send(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let mut state = self.broker.state();
        self.ensure_open(&state)?;

        match state.queues.get_mut(queue) {
            Some(q) => q.ready.push_back(payload.to_vec()),
            None => {
                debug!(queue, "Dropping message for undeclared queue");
                return Ok(());
            }
        }
        state.dispatch(queue);
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, BrokerError> {
        let mut state = self.broker.state();
        self.ensure_open(&state)?;

        let (tx, rx) = mpsc::unbounded_channel();
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .consumers
            .push(ConsumerSlot {
                channel: self.id,
                sender: tx,
            });
        state.dispatch(queue);

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|delivery| (delivery, rx))
        });
        Ok(stream.boxed())
    }

    async fn ack(&self, tag: u64) -> Result<(), BrokerError> {
        let mut state = self.broker.state();
        let Some(channel) = state.channels.get_mut(&self.id) else {
            return Err(BrokerError::Channel("channel is closed".to_string()));
        };
        match channel.unacked.remove(&tag) {
            Some(_) => Ok(()),
            None => Err(BrokerError::Channel(format!("unknown delivery tag {tag}"))),
        }
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.broker.state().close_channel(self.id);
        Ok(())
    }
}
