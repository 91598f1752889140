//! Duration-scoped WebSocket wrapper.
//!
//! A `ResilientSocket` owns one logical subscription for its whole
//! lifetime: it connects, re-announces the subscription after every
//! reconnect, and forwards inbound text frames verbatim. The owner closes
//! it through the returned handle; an explicitly closed socket never
//! reconnects and never delivers another frame.

use crate::error::{WsError, WsResult};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Socket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    /// WebSocket URL.
    pub url: String,
    /// Fixed delay before a reconnect attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Frame sent immediately after every successful open, typically a
    /// subscribe announcement.
    #[serde(default)]
    pub on_open_send: Option<String>,
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            on_open_send: None,
        }
    }

    pub fn with_on_open_send(mut self, frame: impl Into<String>) -> Self {
        self.on_open_send = Some(frame.into());
        self
    }

    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }
}

/// Connection state of one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owner-side handle for a running socket.
///
/// Cloneable; all clones refer to the same socket.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    state: Arc<RwLock<SocketState>>,
    token: CancellationToken,
}

impl SocketHandle {
    /// Current connection state.
    pub fn state(&self) -> SocketState {
        *self.state.read()
    }

    /// Close the socket.
    ///
    /// Idempotent. Cancels any pending reconnect and guarantees that no
    /// further frame is delivered, including frames already in flight.
    pub fn close(&self) {
        if !self.token.is_cancelled() {
            debug!("socket close requested");
        }
        self.token.cancel();
    }

    /// Whether close has been requested (by the owner or its gate).
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Entry point for opening sockets.
pub struct ResilientSocket;

impl ResilientSocket {
    /// Open a socket that lives until the handle is closed.
    ///
    /// Inbound text frames are forwarded verbatim to `frame_tx`; parsing
    /// and validation are the consumer's responsibility.
    pub fn open(config: SocketConfig, frame_tx: mpsc::Sender<String>) -> SocketHandle {
        Self::open_scoped(config, frame_tx, &CancellationToken::new())
    }

    /// Open a socket scoped under an owner gate.
    ///
    /// Cancelling `gate` closes the socket exactly as `SocketHandle::close`
    /// does, so a whole group of sockets can be torn down at once.
    pub fn open_scoped(
        config: SocketConfig,
        frame_tx: mpsc::Sender<String>,
        gate: &CancellationToken,
    ) -> SocketHandle {
        let token = gate.child_token();
        let state = Arc::new(RwLock::new(SocketState::Disconnected));
        let handle = SocketHandle {
            state: state.clone(),
            token: token.clone(),
        };

        tokio::spawn(run_loop(config, frame_tx, token, state));

        handle
    }
}

/// Connect-reconnect loop. Exits only on cancellation.
async fn run_loop(
    config: SocketConfig,
    frame_tx: mpsc::Sender<String>,
    token: CancellationToken,
    state: Arc<RwLock<SocketState>>,
) {
    let delay = Duration::from_millis(config.reconnect_delay_ms);

    loop {
        if token.is_cancelled() {
            break;
        }

        *state.write() = SocketState::Connecting;

        match run_session(&config, &frame_tx, &token, &state).await {
            Ok(()) => {
                // Only cancellation ends a session cleanly.
                break;
            }
            Err(e) => {
                warn!(url = %config.url, error = %e, "socket session ended");
            }
        }

        *state.write() = SocketState::Disconnected;

        if token.is_cancelled() {
            break;
        }

        debug!(
            url = %config.url,
            delay_ms = config.reconnect_delay_ms,
            "scheduling reconnect"
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = token.cancelled() => break,
        }
    }

    *state.write() = SocketState::Disconnected;
    debug!(url = %config.url, "socket loop exited");
}

/// One connected session: open, announce, pump frames until the peer
/// drops us (error) or the owner cancels (ok).
async fn run_session(
    config: &SocketConfig,
    frame_tx: &mpsc::Sender<String>,
    token: &CancellationToken,
    state: &Arc<RwLock<SocketState>>,
) -> WsResult<()> {
    let ws_stream = tokio::select! {
        result = connect_async(&config.url) => {
            let (ws_stream, _response) = result?;
            ws_stream
        }
        () = token.cancelled() => return Ok(()),
    };

    let (mut write, mut read) = ws_stream.split();

    *state.write() = SocketState::Connected;
    info!(url = %config.url, "socket connected");

    if let Some(frame) = &config.on_open_send {
        write.send(Message::Text(frame.clone())).await?;
        debug!(url = %config.url, "sent on-open frame");
    }

    loop {
        tokio::select! {
            () = token.cancelled() => {
                // Best-effort goodbye; the close guarantee does not
                // depend on the peer seeing it.
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        forward_frame(frame_tx, token, text).await?;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "closed by server".to_string()));
                        return Err(WsError::ConnectionClosed { code, reason });
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        return Err(WsError::ConnectionClosed {
                            code: 1006,
                            reason: "stream ended".to_string(),
                        });
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Deliver one frame unless the socket was closed in the meantime.
///
/// A frame that raced a close must be dropped, not processed: a stale
/// delivery mutating a since-replaced consumer is a use-after-teardown bug.
async fn forward_frame(
    frame_tx: &mpsc::Sender<String>,
    token: &CancellationToken,
    text: String,
) -> WsResult<()> {
    if token.is_cancelled() {
        return Ok(());
    }

    tokio::select! {
        result = frame_tx.send(text) => {
            if result.is_err() {
                // Consumer is gone; keeping the socket alive would leak it.
                warn!("frame receiver dropped, closing socket");
                token.cancel();
            }
            Ok(())
        }
        () = token.cancelled() => Ok(()),
    }
}
