//! Account linking error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Rejected by server: HTTP {status}")]
    Rejected { status: u16 },

    #[error("Popup error: {0}")]
    Popup(String),
}

pub type LinkResult<T> = Result<T, LinkError>;
