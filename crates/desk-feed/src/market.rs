//! Live price stream for one symbol.
//!
//! Subscribes to the ticker channel, parses each frame as a numeric
//! price, and maintains a fixed-capacity series of `(timestamp, value)`
//! samples. Labels for display derive from the timestamps downstream;
//! there is deliberately no separate label buffer to drift out of
//! alignment with the values.

use desk_core::{BoundedSeries, PricePoint, StreamState, SubscriptionSpec};
use desk_ws::{ResilientSocket, SocketConfig, SocketHandle, SocketState};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Market stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStreamConfig {
    /// Ticker socket URL.
    pub url: String,
    /// Subscription key (e.g. "BTC-USD").
    pub symbol: String,
    /// Capacity of the price series.
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,
    /// Fixed reconnect delay for the underlying socket.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Buffer size of the frame channel between socket and parser.
    #[serde(default = "default_frame_buffer")]
    pub frame_buffer: usize,
}

fn default_series_capacity() -> usize {
    20
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_frame_buffer() -> usize {
    64
}

impl MarketStreamConfig {
    pub fn new(url: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            symbol: symbol.into(),
            series_capacity: default_series_capacity(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            frame_buffer: default_frame_buffer(),
        }
    }
}

type SharedSeries = Arc<RwLock<BoundedSeries<PricePoint>>>;

/// Live price stream client for one symbol.
pub struct MarketStreamClient {
    config: MarketStreamConfig,
    gate: CancellationToken,
    series: SharedSeries,
    socket: SocketHandle,
    pump: JoinHandle<()>,
}

impl MarketStreamClient {
    /// Open a ticker subscription scoped under the session gate.
    ///
    /// Cancelling the gate closes the socket synchronously; no frame is
    /// processed afterwards.
    pub fn subscribe(config: MarketStreamConfig, gate: &CancellationToken) -> Self {
        let series = Arc::new(RwLock::new(BoundedSeries::new(config.series_capacity)));
        let (socket, pump) = spawn_stream(&config, gate, series.clone());
        info!(symbol = %config.symbol, "market stream subscribed");

        Self {
            config,
            gate: gate.clone(),
            series,
            socket,
            pump,
        }
    }

    /// Switch the subscription key.
    ///
    /// Tears down the current socket and opens a fresh one announcing the
    /// new symbol; the series starts over rather than carrying samples
    /// from the previous symbol. Same key is a no-op.
    pub fn resubscribe(&mut self, symbol: impl Into<String>) {
        let symbol = symbol.into();
        if symbol == self.config.symbol {
            return;
        }

        info!(
            from = %self.config.symbol,
            to = %symbol,
            "resubscribing market stream"
        );

        // Closing the socket ends the old pump once its channel drains;
        // the old series Arc goes with it.
        self.socket.close();
        self.pump.abort();

        self.config.symbol = symbol;
        self.series = Arc::new(RwLock::new(BoundedSeries::new(self.config.series_capacity)));

        let (socket, pump) = spawn_stream(&self.config, &self.gate, self.series.clone());
        self.socket = socket;
        self.pump = pump;
    }

    /// Snapshot of the current price series, oldest first.
    pub fn series(&self) -> BoundedSeries<PricePoint> {
        self.series.read().clone()
    }

    /// Most recent price point, if any.
    pub fn latest(&self) -> Option<PricePoint> {
        self.series.read().last().copied()
    }

    /// Currently subscribed symbol.
    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Stream lifecycle state.
    pub fn state(&self) -> StreamState {
        stream_state(&self.socket)
    }

    /// Close the stream. Terminal; idempotent.
    pub fn shutdown(&self) {
        self.socket.close();
    }
}

fn spawn_stream(
    config: &MarketStreamConfig,
    gate: &CancellationToken,
    series: SharedSeries,
) -> (SocketHandle, JoinHandle<()>) {
    let spec = SubscriptionSpec::ticker(&config.symbol);
    let socket_config = SocketConfig::new(&config.url)
        .with_reconnect_delay_ms(config.reconnect_delay_ms)
        .with_on_open_send(spec.subscribe_frame());

    let (frame_tx, mut frame_rx) = mpsc::channel(config.frame_buffer);
    let socket = ResilientSocket::open_scoped(socket_config, frame_tx, gate);

    let pump = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            apply_frame(&series, &frame);
        }
    });

    (socket, pump)
}

/// Map socket state to the client-facing stream state.
///
/// Backoff between reconnect attempts still counts as `Connecting`; only
/// an explicitly closed socket is `Disconnected`.
fn stream_state(socket: &SocketHandle) -> StreamState {
    if socket.is_closed() {
        return StreamState::Disconnected;
    }
    match socket.state() {
        SocketState::Connected => StreamState::Streaming,
        SocketState::Connecting | SocketState::Disconnected => StreamState::Connecting,
    }
}

/// Parse and apply one ticker frame.
///
/// Malformed input must not corrupt the series: anything that does not
/// parse to a finite number is discarded without touching state.
fn apply_frame(series: &SharedSeries, frame: &str) {
    let Some(value) = parse_price(frame) else {
        debug!(frame, "discarding non-numeric ticker frame");
        return;
    };
    push_sample(series, PricePoint::now(value));
}

fn parse_price(frame: &str) -> Option<f64> {
    let value: f64 = frame.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Append a sample, ignoring one whose timestamp equals the last stored
/// point's timestamp.
fn push_sample(series: &SharedSeries, point: PricePoint) {
    let mut guard = series.write();
    if guard
        .last()
        .is_some_and(|last| last.timestamp == point.timestamp)
    {
        debug!("discarding duplicate-timestamp sample");
        return;
    }
    *guard = guard.push(point);
}
