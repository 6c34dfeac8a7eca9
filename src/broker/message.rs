use serde::Serialize;

/// Identifies one delivery on one channel.
///
/// `generation` names the channel the delivery arrived on; a token is only
/// honoured while that channel is still the client's current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryToken {
    pub generation: u64,
    pub tag: u64,
}

/// A message handed to a consumer callback.
///
/// # Fields
///
/// - `queue` - The queue the message was consumed from.
/// - `payload` - The message body, decoded as UTF-8 (invalid sequences are replaced).
/// - `token` - Acknowledgement token for `BrokerClient::ack`.
/// - `timestamp` - Unix timestamp in milliseconds at which the client received it.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub queue: String,
    pub payload: String,
    pub token: DeliveryToken,
    pub timestamp: i64,
}

impl Message {
    pub fn new(queue: impl Into<String>, payload: &[u8], token: DeliveryToken) -> Self {
        Self {
            queue: queue.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            token,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
