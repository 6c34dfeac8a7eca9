//! AMQP 0-9-1 transport backed by lapin.
//!
//! Queues are declared durable, messages go through the default exchange
//! with the queue name as routing key, and acknowledgements are explicit.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, ConnectionProperties};
use tokio::sync::mpsc;

use crate::broker::transport::{
    Channel, Connection, ConnectionEvent, ConnectionHandle, Delivery, DeliveryStream, Transport,
};
use crate::utils::error::BrokerError;

const REPLY_SUCCESS: u16 = 200;

#[derive(Debug, Clone, Copy, Default)]
pub struct AmqpTransport;

#[async_trait]
impl Transport for AmqpTransport {
    async fn connect(&self, uri: &str) -> Result<Connection, BrokerError> {
        let connection = lapin::Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let on_error = tx.clone();
        connection.on_error(move |err| {
            let _ = on_error.send(ConnectionEvent::Error(err.to_string()));
        });

        Ok(Connection::new(
            AmqpConnection {
                connection,
                events: tx,
            },
            rx,
        ))
    }
}

struct AmqpConnection {
    connection: lapin::Connection,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

#[async_trait]
impl ConnectionHandle for AmqpConnection {
    async fn create_channel(&self) -> Result<Arc<dyn Channel>, BrokerError> {
        let channel = self.connection.create_channel().await?;
        Ok(Arc::new(AmqpChannel { channel }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.connection.close(REPLY_SUCCESS, "closing").await?;
        let _ = self.events.send(ConnectionEvent::Closed);
        Ok(())
    }
}

struct AmqpChannel {
    channel: lapin::Channel,
}

#[async_trait]
impl Channel for AmqpChannel {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        let options = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };
        self.channel
            .queue_declare(queue, options, FieldTable::default())
            .await?;
        Ok(())
    }

    async fn send(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await?;
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, BrokerError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let stream = consumer.map(|delivery| {
            delivery
                .map(|d| Delivery {
                    tag: d.delivery_tag,
                    payload: d.data,
                })
                .map_err(BrokerError::from)
        });
        Ok(stream.boxed())
    }

    async fn ack(&self, tag: u64) -> Result<(), BrokerError> {
        self.channel
            .basic_ack(tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.channel.close(REPLY_SUCCESS, "closing").await?;
        Ok(())
    }
}
