//! Authentication error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Rejected by server: HTTP {status}")]
    Rejected { status: u16 },
}

pub type AuthResult<T> = Result<T, AuthError>;
