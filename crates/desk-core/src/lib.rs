//! Core domain types for the deskstream synchronization layer.
//!
//! This crate provides the fundamental types shared by the stream,
//! session, and account-linking crates:
//! - `BoundedSeries`: fixed-capacity, FIFO-evicting sample buffer
//! - `PricePoint`: timestamped price sample
//! - `Session`, `UserIdentity`: process-wide authentication state
//! - `BalanceSnapshot`: latest balance-by-portfolio mapping
//! - `SubscriptionSpec`: channel subscription descriptor and frame builder

pub mod balance;
pub mod series;
pub mod session;
pub mod subscription;

pub use balance::BalanceSnapshot;
pub use series::{BoundedSeries, PricePoint};
pub use session::{Credentials, Session, UserIdentity};
pub use subscription::{Channel, StreamState, SubscriptionSpec};
