//! Subscription descriptors and stream lifecycle states.

use serde::{Deserialize, Serialize};

/// Streaming channel kinds served by the market-data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Per-symbol price ticks.
    Ticker,
    /// Per-user balance updates.
    Balance,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ticker => write!(f, "ticker"),
            Self::Balance => write!(f, "balance"),
        }
    }
}

/// Describes one socket subscription: which channel, keyed by what.
///
/// Changing the key is resubscribe-on-change: the owner tears the socket
/// down and opens a fresh one with the new frame, never patches in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
    pub channel: Channel,
    /// Symbol for ticker channels, user id for balance channels.
    pub key: String,
}

impl SubscriptionSpec {
    /// Ticker subscription for a symbol (e.g. "BTC-USD").
    pub fn ticker(symbol: impl Into<String>) -> Self {
        Self {
            channel: Channel::Ticker,
            key: symbol.into(),
        }
    }

    /// Balance subscription for a user id.
    pub fn balance(user_id: impl Into<String>) -> Self {
        Self {
            channel: Channel::Balance,
            key: user_id.into(),
        }
    }

    /// Render the announce frame sent right after the socket opens.
    pub fn subscribe_frame(&self) -> String {
        let frame = match self.channel {
            Channel::Ticker => serde_json::json!({
                "channel": "ticker",
                "symbol": self.key,
            }),
            Channel::Balance => serde_json::json!({
                "userId": self.key,
            }),
        };
        frame.to_string()
    }
}

/// Lifecycle of a stream client.
///
/// Cycles back through `Connecting` on every reconnect attempt; terminal
/// only on explicit shutdown by the owning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Streaming,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Streaming => write!(f, "STREAMING"),
        }
    }
}
