//! Authentication session state.
//!
//! `Session` is the one piece of state every other component reads. It is
//! owned exclusively by the session manager; everything else receives it
//! through a watch channel and reacts to its transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity returned by the session-info endpoint.
///
/// Immutable once fetched; replaced wholesale on each successful check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Opaque user identifier.
    pub id: String,
    /// Account username.
    pub username: String,
    /// Account email, if the endpoint carries it.
    #[serde(default)]
    pub email: Option<String>,
}

/// Credentials submitted to the login endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Current authentication state of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Whether the ambient credential is currently valid.
    pub authenticated: bool,
    /// Identity of the signed-in user, when known.
    pub user: Option<UserIdentity>,
    /// When the session was last checked or transitioned.
    pub last_checked_at: DateTime<Utc>,
}

impl Session {
    /// The state a process starts in: unauthenticated, no identity.
    pub fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            user: None,
            last_checked_at: Utc::now(),
        }
    }

    /// An authenticated session, optionally carrying the identity.
    pub fn authenticated(user: Option<UserIdentity>) -> Self {
        Self {
            authenticated: true,
            user,
            last_checked_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unauthenticated()
    }
}
