use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::{EventListener, Frame, Realtime, RealtimeSlot, upgrade};

type Client =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve(slot: RealtimeSlot) -> SocketAddr {
    let app = Router::new()
        .route("/socket", get(upgrade))
        .with_state(slot);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/socket"))
        .await
        .expect("WebSocket handshake failed");
    ws
}

async fn send(ws: &mut Client, frame: &Frame) {
    ws.send(WsMessage::Text(serde_json::to_string(frame).unwrap().into()))
        .await
        .expect("Failed to send frame");
}

async fn next_frame(ws: &mut Client) -> Frame {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("no frame in time")
            .expect("stream ended")
            .expect("websocket error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(&text).expect("invalid frame");
        }
    }
}

fn echo_transport() -> Realtime {
    Realtime::new(vec![
        EventListener::new("ping", |_, socket, args| {
            socket.emit("pong", args);
        }),
        EventListener::new("say", |realtime, _, args| {
            realtime.emit("said", args);
        }),
    ])
}

#[tokio::test]
async fn test_upgrade_refused_until_transport_ready() {
    let slot: RealtimeSlot = Arc::new(OnceLock::new());
    let addr = serve(slot.clone()).await;

    assert!(connect_async(format!("ws://{addr}/socket")).await.is_err());

    assert!(slot.set(echo_transport()).is_ok());
    let mut ws = connect(addr).await;
    send(&mut ws, &Frame::new("ping", vec![json!(1)])).await;
    assert_eq!(next_frame(&mut ws).await, Frame::new("pong", vec![json!(1)]));
}

#[tokio::test]
async fn test_listener_receives_socket_and_args() {
    let slot: RealtimeSlot = Arc::new(OnceLock::new());
    let _ = slot.set(echo_transport());
    let addr = serve(slot).await;

    let mut ws = connect(addr).await;
    let args = vec![json!("hello"), json!({ "room": 4 })];
    send(&mut ws, &Frame::new("ping", args.clone())).await;

    assert_eq!(next_frame(&mut ws).await, Frame::new("pong", args));
}

#[tokio::test]
async fn test_broadcast_reaches_every_socket() {
    let slot: RealtimeSlot = Arc::new(OnceLock::new());
    let transport = echo_transport();
    let _ = slot.set(transport.clone());
    let addr = serve(slot).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    // Wait until both sockets are registered before broadcasting.
    for _ in 0..100 {
        if transport.connection_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(transport.connection_count(), 2);

    send(&mut a, &Frame::new("say", vec![json!("hi all")])).await;

    assert_eq!(next_frame(&mut a).await, Frame::new("said", vec![json!("hi all")]));
    assert_eq!(next_frame(&mut b).await, Frame::new("said", vec![json!("hi all")]));
}

#[tokio::test]
async fn test_bad_frames_do_not_drop_connection() {
    let slot: RealtimeSlot = Arc::new(OnceLock::new());
    let _ = slot.set(echo_transport());
    let addr = serve(slot).await;

    let mut ws = connect(addr).await;
    ws.send(WsMessage::Text("not json".to_string().into()))
        .await
        .unwrap();
    send(&mut ws, &Frame::new("unbound", vec![])).await;
    send(&mut ws, &Frame::new("ping", vec![])).await;

    assert_eq!(next_frame(&mut ws).await, Frame::new("pong", vec![]));
}

#[tokio::test]
async fn test_disconnect_unregisters_socket() {
    let slot: RealtimeSlot = Arc::new(OnceLock::new());
    let transport = echo_transport();
    let _ = slot.set(transport.clone());
    let addr = serve(slot).await;

    let mut ws = connect(addr).await;
    send(&mut ws, &Frame::new("ping", vec![])).await;
    next_frame(&mut ws).await;
    assert_eq!(transport.connection_count(), 1);

    ws.close(None).await.unwrap();

    for _ in 0..100 {
        if transport.connection_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(transport.connection_count(), 0);
    assert_eq!(transport.emit("late", vec![]), 0);
}

#[test]
fn test_frame_args_default_to_empty() {
    let frame: Frame = serde_json::from_str(r#"{"event":"join"}"#).unwrap();
    assert_eq!(frame, Frame::new("join", vec![]));
}
