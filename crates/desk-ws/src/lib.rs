//! Resilient WebSocket transport for deskstream clients.
//!
//! Provides a duration-scoped socket wrapper with:
//! - Automatic reconnection with a fixed delay (default 3000 ms)
//! - Optional announce frame sent on every successful open
//! - Verbatim text-frame forwarding over an mpsc channel
//! - Idempotent close that cancels pending reconnects and drops
//!   late-arriving frames

pub mod error;
pub mod socket;

pub use error::{WsError, WsResult};
pub use socket::{ResilientSocket, SocketConfig, SocketHandle, SocketState};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any wss:// connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
