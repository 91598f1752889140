//! External account linking flow.
//!
//! Linking happens in an external browser window: the flow fetches the
//! authorization URL, opens the popup, and polls the status endpoint on a
//! fixed interval until the backend confirms the link. The completion
//! signal is the status endpoint, never the popup itself, so the flow
//! works even when the window navigates cross-origin.

use crate::api::{LinkApi, LinkConfig};
use crate::error::LinkResult;
use crate::popup::{PopupBrowser, PopupWindow};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of one account-link attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No attempt in flight and no link established.
    Unlinked,
    /// Popup open, status polling in progress.
    Linking,
    /// Backend confirmed the link. Terminal.
    Linked,
    /// Polling exhausted its attempt budget. Terminal for this attempt.
    Failed,
    /// The attempt was cancelled. Terminal for this attempt.
    Cancelled,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Unlinked => "unlinked",
            LinkState::Linking => "linking",
            LinkState::Linked => "linked",
            LinkState::Failed => "failed",
            LinkState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

struct Inner<A, B: PopupBrowser> {
    api: A,
    browser: B,
    poll_interval: Duration,
    max_poll_attempts: u32,
    gate: CancellationToken,
    state_tx: watch::Sender<LinkState>,
    window: Mutex<Option<B::Window>>,
    /// Token of the poll task currently in flight, if any.
    poll_token: Mutex<Option<CancellationToken>>,
}

/// Account linking flow.
///
/// Cheap to clone; all clones share the same attempt.
pub struct AccountLinkFlow<A: LinkApi, B: PopupBrowser> {
    inner: Arc<Inner<A, B>>,
}

impl<A: LinkApi, B: PopupBrowser> Clone for AccountLinkFlow<A, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: LinkApi, B: PopupBrowser> AccountLinkFlow<A, B> {
    /// Create a flow in the `Unlinked` state, gated under the session
    /// scope token like the stream clients.
    pub fn new(api: A, browser: B, config: &LinkConfig, gate: &CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Unlinked);
        Self {
            inner: Arc::new(Inner {
                api,
                browser,
                poll_interval: Duration::from_millis(config.poll_interval_ms),
                max_poll_attempts: config.max_poll_attempts,
                gate: gate.clone(),
                state_tx,
                window: Mutex::new(None),
                poll_token: Mutex::new(None),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.inner.state_tx.subscribe()
    }

    /// Begin a link attempt: fetch the authorization URL, open the popup,
    /// and start polling. No-op while an attempt is in flight or once
    /// linked; a failed or cancelled attempt can be started over.
    ///
    /// An error fetching the URL or opening the popup propagates and
    /// leaves the state untouched.
    pub async fn start(&self) -> LinkResult<()> {
        if matches!(self.state(), LinkState::Linking | LinkState::Linked) {
            debug!(state = %self.state(), "link attempt already in flight or complete");
            return Ok(());
        }

        let url = self.inner.api.authorize_url().await?;
        let window = self.inner.browser.open(&url)?;
        *self.inner.window.lock() = Some(window);

        let token = self.inner.gate.child_token();
        *self.inner.poll_token.lock() = Some(token.clone());
        self.inner.state_tx.send_replace(LinkState::Linking);
        info!("link attempt started, polling for confirmation");

        let inner = self.inner.clone();
        tokio::spawn(async move { run_poll(inner, token).await });
        Ok(())
    }

    /// Cancel the attempt in flight: the poll timer stops and the state
    /// becomes `Cancelled`. The popup is left open for the user to deal
    /// with. Idempotent; cancelling a settled attempt is a no-op.
    pub fn cancel(&self) {
        if let Some(token) = self.inner.poll_token.lock().take() {
            token.cancel();
        }
        if self.inner.transition_from_linking(LinkState::Cancelled) {
            info!("link attempt cancelled");
        }
    }
}

impl<A: LinkApi, B: PopupBrowser> Inner<A, B> {
    /// Settle the attempt. Only a `Linking` attempt can settle, which is
    /// what makes `Linked` fire exactly once.
    fn transition_from_linking(&self, next: LinkState) -> bool {
        self.state_tx.send_if_modified(|state| {
            if *state == LinkState::Linking {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    fn close_window(&self) {
        if let Some(mut window) = self.window.lock().take() {
            if window.is_open() {
                window.close();
            }
        }
    }
}

async fn run_poll<A: LinkApi, B: PopupBrowser>(inner: Arc<Inner<A, B>>, token: CancellationToken) {
    let mut interval = tokio::time::interval(inner.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the first status check belongs
    // one full period after the popup opens.
    interval.tick().await;

    for attempt in 1..=inner.max_poll_attempts {
        tokio::select! {
            () = token.cancelled() => {
                inner.transition_from_linking(LinkState::Cancelled);
                return;
            }
            _ = interval.tick() => {
                match inner.api.link_status().await {
                    Ok(true) => {
                        inner.close_window();
                        if inner.transition_from_linking(LinkState::Linked) {
                            info!(attempt, "account linked");
                        }
                        return;
                    }
                    Ok(false) => {
                        debug!(attempt, "link not yet established");
                    }
                    // Transient transport trouble mid-poll is not fatal;
                    // the attempt budget bounds it.
                    Err(e) => {
                        warn!(attempt, error = %e, "link status check failed");
                    }
                }
            }
        }
    }

    warn!(
        attempts = inner.max_poll_attempts,
        "link polling exhausted without confirmation"
    );
    inner.transition_from_linking(LinkState::Failed);
}
