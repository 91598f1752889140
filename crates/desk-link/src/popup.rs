//! Popup window collaborator.
//!
//! Window management belongs to the embedding application; the flow only
//! needs to open a window at the authorization URL and close it once the
//! link confirms. The traits are synchronous: opening and closing a
//! window never block on the network.

use crate::error::LinkResult;

/// Opens popup windows.
pub trait PopupBrowser: Send + Sync + 'static {
    type Window: PopupWindow;

    /// Open a window navigated to `url`.
    fn open(&self, url: &str) -> LinkResult<Self::Window>;
}

/// Handle to an open popup window.
///
/// Dropping the handle MUST NOT close the window: cancelling the flow
/// leaves the window under the user's control.
pub trait PopupWindow: Send + Sync + 'static {
    /// Close the window. Idempotent.
    fn close(&mut self);

    /// Whether the window is still open. The user may have closed it
    /// themselves at any point.
    fn is_open(&self) -> bool;
}
