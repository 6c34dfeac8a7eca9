//! The `realtime` module is the WebSocket event transport that shares the
//! HTTP listener.
//!
//! Clients exchange JSON `Frame`s. Every inbound frame is dispatched to the
//! `EventListener` registered for its event name, with the transport handle
//! and the sending socket passed in explicitly. The transport only exists
//! once the bootstrap has finished with the broker; until then upgrades are
//! refused with 503.

pub mod message;
pub mod socket;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use message::Frame;
pub use socket::Socket;

use crate::http::AppError;

/// Callback bound to one event name on every connection.
pub type Listener = Arc<dyn Fn(&Realtime, &Socket, Vec<Value>) + Send + Sync>;

/// Holder for the transport, filled in once by the bootstrap.
pub type RealtimeSlot = Arc<OnceLock<Realtime>>;

#[derive(Clone)]
pub struct EventListener {
    pub event: String,
    pub listener: Listener,
}

impl EventListener {
    pub fn new<F>(event: impl Into<String>, listener: F) -> Self
    where
        F: Fn(&Realtime, &Socket, Vec<Value>) + Send + Sync + 'static,
    {
        Self {
            event: event.into(),
            listener: Arc::new(listener),
        }
    }
}

impl std::fmt::Debug for EventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListener")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

struct RealtimeInner {
    sockets: RwLock<HashMap<String, Socket>>,
    listeners: HashMap<String, Listener>,
}

/// Handle to the real-time transport. Clones share the same registry.
#[derive(Clone)]
pub struct Realtime {
    inner: Arc<RealtimeInner>,
}

impl Realtime {
    pub fn new(listeners: Vec<EventListener>) -> Self {
        let listeners = listeners
            .into_iter()
            .map(|l| (l.event, l.listener))
            .collect();
        Self {
            inner: Arc::new(RealtimeInner {
                sockets: RwLock::new(HashMap::new()),
                listeners,
            }),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner
            .sockets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Broadcasts `event` to every connected socket. Returns how many
    /// sockets accepted it.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> usize {
        let sockets: Vec<Socket> = self
            .inner
            .sockets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        sockets
            .iter()
            .filter(|socket| socket.emit(event, args.clone()))
            .count()
    }

    /// Sends `event` to one socket. Returns `false` when it is not connected.
    pub fn emit_to(&self, socket_id: &str, event: &str, args: Vec<Value>) -> bool {
        let socket = self
            .inner
            .sockets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(socket_id)
            .cloned();
        socket.is_some_and(|s| s.emit(event, args))
    }

    fn register(&self, socket: Socket) {
        self.inner
            .sockets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(socket.id().to_string(), socket);
    }

    fn unregister(&self, socket_id: &str) {
        self.inner
            .sockets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(socket_id);
    }

    fn dispatch(&self, socket: &Socket, text: &str) {
        match serde_json::from_str::<Frame>(text) {
            Ok(frame) => match self.inner.listeners.get(&frame.event) {
                Some(listener) => listener(self, socket, frame.args),
                None => debug!(socket = %socket.id(), event = %frame.event, "No listener bound"),
            },
            Err(err) => warn!(
                socket = %socket.id(),
                "Invalid real-time frame: {err} | {}",
                text.chars().take(100).collect::<String>()
            ),
        }
    }

    /// Drives one upgraded connection until the client goes away.
    pub async fn accept(&self, ws: WebSocket) {
        let (mut ws_sender, mut ws_receiver) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
        let socket = Socket::new(tx);
        let socket_id = socket.id().to_string();

        self.register(socket.clone());
        info!(socket = %socket_id, "Client connected");

        let send_loop = {
            let socket_id = socket_id.clone();
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if let Err(e) = ws_sender.send(msg).await {
                        debug!(socket = %socket_id, "Failed to send message: {e}");
                        break;
                    }
                }
            })
        };

        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                WsMessage::Text(text) => self.dispatch(&socket, &text),
                WsMessage::Close(_) => break,
                _ => {}
            }
        }

        self.unregister(&socket_id);
        drop(socket);
        send_loop.abort();
        info!(socket = %socket_id, "Client disconnected");
    }
}

impl std::fmt::Debug for Realtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realtime")
            .field("connections", &self.connection_count())
            .field("events", &self.inner.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Upgrade handler for the real-time route.
pub async fn upgrade(State(slot): State<RealtimeSlot>, ws: WebSocketUpgrade) -> Response {
    match slot.get() {
        Some(realtime) => {
            let realtime = realtime.clone();
            ws.on_upgrade(move |socket| async move { realtime.accept(socket).await })
        }
        None => AppError::new(
            "Real-time transport is not ready",
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .into_response(),
    }
}

#[cfg(test)]
mod tests;
