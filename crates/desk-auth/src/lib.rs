//! Authentication session management for deskstream.
//!
//! `AuthSessionManager` owns the process-wide `Session`: it validates the
//! ambient credential at startup, re-validates it on a fixed interval,
//! and exposes login/logout transitions. Dependent components (stream
//! clients, the account-link flow) subscribe to session changes through a
//! watch channel and run under a scope token that is cancelled the
//! instant the session becomes unauthenticated.

pub mod api;
pub mod error;
pub mod manager;

pub use api::{HttpSessionApi, SessionApi, SessionConfig};
pub use error::{AuthError, AuthResult};
pub use manager::AuthSessionManager;
