//! The seam between `BrokerClient` and a concrete broker wire.
//!
//! A `Transport` dials a `Connection`; a connection opens `Channel`s. The
//! connection reports its own lifecycle through `next_event`, which is how the
//! supervisor learns that it has to reconnect.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use crate::utils::error::BrokerError;

/// Stream of deliveries for one consumer. Ends when the channel goes away.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// A raw message as handed over by the wire.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Channel-scoped delivery tag used to acknowledge the message.
    pub tag: u64,
    pub payload: Vec<u8>,
}

/// Lifecycle signal of a broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Error(String),
    Closed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Connection, BrokerError>;
}

#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    async fn create_channel(&self) -> Result<Arc<dyn Channel>, BrokerError>;
    async fn close(&self) -> Result<(), BrokerError>;
}

/// Logical session over a connection, used both to publish and to consume.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Idempotent queue declaration.
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError>;
    async fn send(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError>;
    async fn consume(&self, queue: &str) -> Result<DeliveryStream, BrokerError>;
    async fn ack(&self, tag: u64) -> Result<(), BrokerError>;
    async fn close(&self) -> Result<(), BrokerError>;
}

/// A live broker connection.
///
/// Owned by whoever called `BrokerClient::connect`; the client itself only
/// keeps the channel it opened.
pub struct Connection {
    handle: Box<dyn ConnectionHandle>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Connection {
    pub fn new(
        handle: impl ConnectionHandle + 'static,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
    ) -> Self {
        Self {
            handle: Box::new(handle),
            events,
        }
    }

    pub async fn create_channel(&self) -> Result<Arc<dyn Channel>, BrokerError> {
        self.handle.create_channel().await
    }

    /// Waits for the next lifecycle event.
    ///
    /// A connection whose event source has gone away is reported as closed.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        self.events.recv().await.unwrap_or(ConnectionEvent::Closed)
    }

    pub async fn close(&self) -> Result<(), BrokerError> {
        self.handle.close().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
