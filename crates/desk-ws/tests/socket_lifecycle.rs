//! Socket lifecycle tests against an in-process WebSocket server.
//!
//! Covers frame ordering, on-open announcement, reconnection after the
//! server drops the connection, and the close guarantees (no reconnect,
//! no late delivery).

use desk_ws::{ResilientSocket, SocketConfig, SocketState};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn recv_frame(rx: &mut mpsc::Receiver<String>) -> String {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("frame channel closed")
}

#[tokio::test]
async fn test_frames_forwarded_in_arrival_order() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        for price in ["100", "101", "102"] {
            ws.send(Message::Text(price.to_string())).await.unwrap();
        }
        // Hold the connection open so the client does not reconnect.
        sleep(Duration::from_secs(5)).await;
    });

    let (tx, mut rx) = mpsc::channel(16);
    let handle = ResilientSocket::open(SocketConfig::new(&url).with_reconnect_delay_ms(50), tx);

    assert_eq!(recv_frame(&mut rx).await, "100");
    assert_eq!(recv_frame(&mut rx).await, "101");
    assert_eq!(recv_frame(&mut rx).await, "102");

    handle.close();
}

#[tokio::test]
async fn test_on_open_frame_resent_after_reconnect() {
    let (listener, url) = bind().await;
    let (announce_tx, mut announce_rx) = mpsc::channel(4);

    tokio::spawn(async move {
        // First connection: record the announce frame, then drop the
        // connection to force a reconnect.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            announce_tx.send(text).await.unwrap();
        }
        drop(ws);

        // Second connection: record the announce frame again.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            announce_tx.send(text).await.unwrap();
        }
        sleep(Duration::from_secs(5)).await;
    });

    let subscribe = r#"{"channel":"ticker","symbol":"BTC-USD"}"#;
    let (tx, _rx) = mpsc::channel(16);
    let handle = ResilientSocket::open(
        SocketConfig::new(&url)
            .with_reconnect_delay_ms(50)
            .with_on_open_send(subscribe),
        tx,
    );

    let first = timeout(RECV_TIMEOUT, announce_rx.recv()).await.unwrap();
    let second = timeout(RECV_TIMEOUT, announce_rx.recv()).await.unwrap();
    assert_eq!(first.as_deref(), Some(subscribe));
    assert_eq!(second.as_deref(), Some(subscribe));

    handle.close();
}

#[tokio::test]
async fn test_closed_socket_never_reconnects() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));
    let accepts_server = accepts.clone();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            accepts_server.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut ws = accept_async(stream).await.unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    let (tx, _rx) = mpsc::channel(16);
    let handle = ResilientSocket::open(SocketConfig::new(&url).with_reconnect_delay_ms(50), tx);

    // Let the first connection establish, then close.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 1);

    handle.close();
    handle.close(); // double close is a no-op

    // Well past several reconnect delays: still exactly one connection.
    sleep(Duration::from_millis(400)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state(), SocketState::Disconnected);
}

#[tokio::test]
async fn test_late_frame_after_close_is_dropped() {
    let (listener, url) = bind().await;
    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text("100".to_string())).await.unwrap();
        ready_tx.send(()).unwrap();

        // Wait until the client has closed, then push one more frame
        // into the transport.
        closed_rx.await.unwrap();
        let _ = ws.send(Message::Text("999".to_string())).await;
        sleep(Duration::from_millis(200)).await;
    });

    let (tx, mut rx) = mpsc::channel(16);
    let handle = ResilientSocket::open(SocketConfig::new(&url).with_reconnect_delay_ms(50), tx);

    assert_eq!(recv_frame(&mut rx).await, "100");
    ready_rx.await.unwrap();

    handle.close();
    closed_tx.send(()).unwrap();

    // The late frame must never reach the channel; the channel just ends.
    let late = timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(
        matches!(late, Ok(None) | Err(_)),
        "late frame was delivered after close: {late:?}"
    );
}

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        // Drop the first connection immediately after one frame.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text("1".to_string())).await.unwrap();
        drop(ws);

        // Serve the second connection normally.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text("2".to_string())).await.unwrap();
        sleep(Duration::from_secs(5)).await;
    });

    let (tx, mut rx) = mpsc::channel(16);
    let handle = ResilientSocket::open(SocketConfig::new(&url).with_reconnect_delay_ms(25), tx);

    assert_eq!(recv_frame(&mut rx).await, "1");
    assert_eq!(recv_frame(&mut rx).await, "2");
    assert_eq!(handle.state(), SocketState::Connected);

    handle.close();
}
