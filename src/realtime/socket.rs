use axum::extract::ws::Message as WsMessage;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::realtime::message::Frame;

/// Represents one connected real-time client.
///
/// Each socket is uniquely identified by an `id` and owns the channel its
/// send loop drains into the WebSocket.
#[derive(Debug, Clone)]
pub struct Socket {
    id: String,
    connected_at: i64,
    sender: UnboundedSender<WsMessage>,
}

impl Socket {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("socket-{}", uuid::Uuid::new_v4()),
            connected_at: chrono::Utc::now().timestamp_millis(),
            sender,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unix timestamp in milliseconds of the upgrade.
    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    /// Sends `event` to this client. Returns `false` once the client is gone.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> bool {
        match serde_json::to_string(&Frame::new(event, args)) {
            Ok(text) => self.send_raw(WsMessage::Text(text)),
            Err(e) => {
                warn!(socket = %self.id, "Failed to serialize frame: {e}");
                false
            }
        }
    }

    pub(crate) fn send_raw(&self, message: WsMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}
