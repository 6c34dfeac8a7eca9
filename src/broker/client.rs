//! Broker client
//!
//! `BrokerClient` is the single point of access to the broker for the whole
//! process. It holds exactly one channel at a time:
//! - `connect` dials a new connection, opens one channel on it and installs
//!   that channel as current, replacing whatever was there before
//! - `publish`, `consume` and `ack` act on the current channel and quietly do
//!   nothing when there is none
//! - `close` closes the channel but leaves the connection to its owner
//!
//! Concurrency notes:
//! - The current channel sits behind an async `RwLock`. Operations clone the
//!   `Arc` out and release the lock before doing any I/O, so a reconnect can
//!   swap the channel while publishes are in flight.
//! - Each installed channel gets a new generation number. Delivery tokens
//!   carry the generation they were issued under; acks for an older
//!   generation are dropped instead of reaching an unrelated channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::broker::message::{DeliveryToken, Message};
use crate::broker::transport::{Channel, Connection, Transport};
use crate::utils::error::BrokerError;

#[derive(Clone)]
struct CurrentChannel {
    generation: u64,
    channel: Arc<dyn Channel>,
}

pub struct BrokerClient {
    transport: Arc<dyn Transport>,
    current: RwLock<Option<CurrentChannel>>,
    generations: AtomicU64,
}

impl BrokerClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            current: RwLock::new(None),
            generations: AtomicU64::new(0),
        }
    }

    /// Opens a connection to `uri` and installs a fresh channel on it.
    ///
    /// Dial failures are returned unchanged; retrying is the caller's job.
    pub async fn connect(&self, uri: &str) -> Result<Connection, BrokerError> {
        let connection = self.transport.connect(uri).await?;
        let channel = connection.create_channel().await?;

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        *self.current.write().await = Some(CurrentChannel {
            generation,
            channel,
        });

        info!(generation, "Broker channel opened");
        Ok(connection)
    }

    async fn current(&self) -> Option<CurrentChannel> {
        self.current.read().await.clone()
    }

    pub async fn has_channel(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Declares `queue` and enqueues `message` on it.
    pub async fn publish(&self, queue: &str, message: &str) -> Result<(), BrokerError> {
        let Some(current) = self.current().await else {
            debug!(queue, "No broker channel, publish skipped");
            return Ok(());
        };

        current.channel.declare_queue(queue).await?;
        current.channel.send(queue, message.as_bytes()).await
    }

    /// Declares `queue` and invokes `on_message` once per delivery.
    ///
    /// With `auto_ack` the delivery is acknowledged on the channel it came in
    /// on as soon as `on_message` returns. Without it the caller acks through
    /// `ack`. Deliveries stop when the channel goes away.
    pub async fn consume<F>(
        &self,
        queue: &str,
        auto_ack: bool,
        mut on_message: F,
    ) -> Result<(), BrokerError>
    where
        F: FnMut(Message) + Send + 'static,
    {
        let Some(current) = self.current().await else {
            debug!(queue, "No broker channel, consume skipped");
            return Ok(());
        };

        current.channel.declare_queue(queue).await?;
        let mut deliveries = current.channel.consume(queue).await?;
        let queue = queue.to_string();

        tokio::spawn(async move {
            while let Some(delivery) = deliveries.next().await {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        warn!(queue = %queue, "Consumer failed: {e}");
                        break;
                    }
                };

                let token = DeliveryToken {
                    generation: current.generation,
                    tag: delivery.tag,
                };
                on_message(Message::new(queue.as_str(), &delivery.payload, token));

                if auto_ack {
                    if let Err(e) = current.channel.ack(delivery.tag).await {
                        warn!(queue = %queue, tag = delivery.tag, "Auto-ack failed: {e}");
                    }
                }
            }
            debug!(queue = %queue, generation = current.generation, "Consumer stopped");
        });

        Ok(())
    }

    /// Acknowledges `message` on the current channel.
    ///
    /// No-op when there is no channel or when the message came in on a
    /// channel that has since been replaced.
    pub async fn ack(&self, message: &Message) -> Result<(), BrokerError> {
        let Some(current) = self.current().await else {
            debug!("No broker channel, ack skipped");
            return Ok(());
        };

        if current.generation != message.token.generation {
            debug!(
                stale = message.token.generation,
                current = current.generation,
                "Ack for a replaced channel dropped"
            );
            return Ok(());
        }

        current.channel.ack(message.token.tag).await
    }

    /// Closes the current channel and forgets it.
    pub async fn close(&self) -> Result<(), BrokerError> {
        let taken = self.current.write().await.take();
        if let Some(current) = taken {
            current.channel.close().await?;
            info!(generation = current.generation, "Broker channel closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("generation", &self.generations.load(Ordering::SeqCst))
            .finish()
    }
}
