//! External account linking for deskstream.
//!
//! `AccountLinkFlow` drives the link handshake with the external broker:
//! it fetches the authorization URL, hands it to a popup window through
//! the `PopupBrowser` collaborator, and polls the backend on a fixed
//! interval until the link confirms, the attempt budget runs out, or the
//! user cancels. The flow runs under the session scope token so it dies
//! with the session.

pub mod api;
pub mod error;
pub mod flow;
pub mod popup;

pub use api::{HttpLinkApi, LinkApi, LinkConfig};
pub use error::{LinkError, LinkResult};
pub use flow::{AccountLinkFlow, LinkState};
pub use popup::{PopupBrowser, PopupWindow};
