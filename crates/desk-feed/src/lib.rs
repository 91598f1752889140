//! Typed stream clients for the deskstream synchronization layer.
//!
//! Each client owns exactly one `ResilientSocket` and republishes its
//! frames as bounded, typed application state:
//! - `MarketStreamClient`: per-symbol price ticks into a `BoundedSeries`
//! - `BalanceStreamClient`: per-user balance frames into a latest snapshot
//!
//! Both are gated by the session scope token: when the session manager
//! cancels the scope, every socket owned by these clients closes
//! synchronously.

pub mod balance;
pub mod market;

pub use balance::{BalanceStreamClient, BalanceStreamConfig};
pub use market::{MarketStreamClient, MarketStreamConfig};
