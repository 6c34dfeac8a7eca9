//! The `broker` module holds the message-broker client and the transports it
//! can run over.

pub mod amqp;
pub mod client;
pub mod memory;
pub mod message;
pub mod transport;

use std::sync::Arc;

pub use amqp::AmqpTransport;
pub use client::BrokerClient;
pub use memory::MemoryBroker;
pub use message::{DeliveryToken, Message};
pub use transport::{Connection, ConnectionEvent, Transport};

use crate::utils::error::BrokerError;

/// Picks the transport serving `uri`: `amqp://`/`amqps://` go to lapin,
/// `memory://` to a fresh in-process broker.
pub fn transport_for(uri: &str) -> Result<Arc<dyn Transport>, BrokerError> {
    match uri.split_once("://").map(|(scheme, _)| scheme) {
        Some("amqp") | Some("amqps") => Ok(Arc::new(AmqpTransport)),
        Some("memory") => Ok(Arc::new(MemoryBroker::new())),
        _ => Err(BrokerError::UnsupportedUri(uri.to_string())),
    }
}

#[cfg(test)]
mod tests;
