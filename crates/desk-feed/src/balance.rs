//! Live balance stream for the authenticated user.
//!
//! Announces the user id on open and keeps only the newest snapshot:
//! each structurally valid frame replaces the previous snapshot
//! wholesale, never merged field-by-field. Frames that fail validation
//! are discarded silently.

use desk_core::{BalanceSnapshot, StreamState, SubscriptionSpec};
use desk_ws::{ResilientSocket, SocketConfig, SocketHandle, SocketState};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Balance stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceStreamConfig {
    /// Balance socket URL.
    pub url: String,
    /// Identifier of the authenticated user; sent as the announce frame.
    pub user_id: String,
    /// Fixed reconnect delay for the underlying socket.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Buffer size of the frame channel between socket and parser.
    #[serde(default = "default_frame_buffer")]
    pub frame_buffer: usize,
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_frame_buffer() -> usize {
    16
}

impl BalanceStreamConfig {
    pub fn new(url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_id: user_id.into(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            frame_buffer: default_frame_buffer(),
        }
    }
}

/// Wire shape of one balance frame.
#[derive(Debug, Deserialize)]
struct BalanceFrame {
    balance: BalanceSnapshot,
}

type SharedSnapshot = Arc<RwLock<Option<BalanceSnapshot>>>;

/// Live balance stream client for one user.
pub struct BalanceStreamClient {
    user_id: String,
    latest: SharedSnapshot,
    socket: SocketHandle,
    _pump: JoinHandle<()>,
}

impl BalanceStreamClient {
    /// Open the balance subscription scoped under the session gate.
    pub fn connect(config: BalanceStreamConfig, gate: &CancellationToken) -> Self {
        let spec = SubscriptionSpec::balance(&config.user_id);
        let socket_config = SocketConfig::new(&config.url)
            .with_reconnect_delay_ms(config.reconnect_delay_ms)
            .with_on_open_send(spec.subscribe_frame());

        let (frame_tx, mut frame_rx) = mpsc::channel(config.frame_buffer);
        let socket = ResilientSocket::open_scoped(socket_config, frame_tx, gate);

        let latest: SharedSnapshot = Arc::new(RwLock::new(None));
        let latest_pump = latest.clone();
        let pump = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                apply_frame(&latest_pump, &frame);
            }
        });

        info!(user_id = %config.user_id, "balance stream connected");

        Self {
            user_id: config.user_id,
            latest,
            socket,
            _pump: pump,
        }
    }

    /// Newest balance snapshot, if one has arrived.
    pub fn latest(&self) -> Option<BalanceSnapshot> {
        self.latest.read().clone()
    }

    /// User this stream is keyed by.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Stream lifecycle state.
    pub fn state(&self) -> StreamState {
        if self.socket.is_closed() {
            return StreamState::Disconnected;
        }
        match self.socket.state() {
            SocketState::Connected => StreamState::Streaming,
            SocketState::Connecting | SocketState::Disconnected => StreamState::Connecting,
        }
    }

    /// Close the stream. Terminal; idempotent.
    pub fn shutdown(&self) {
        self.socket.close();
    }
}

/// Validate and apply one balance frame, replacing the snapshot wholesale.
fn apply_frame(latest: &SharedSnapshot, frame: &str) {
    match serde_json::from_str::<BalanceFrame>(frame) {
        Ok(parsed) => {
            *latest.write() = Some(parsed.balance);
        }
        Err(e) => {
            debug!(error = %e, "discarding malformed balance frame");
        }
    }
}
