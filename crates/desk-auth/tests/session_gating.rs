//! Session gating across components.
//!
//! While the session is unauthenticated, no stream client may hold an
//! open socket: the scope token cancelled by the manager must tear the
//! sockets down synchronously with the transition.

use async_trait::async_trait;
use desk_auth::{AuthError, AuthResult, AuthSessionManager, SessionApi, SessionConfig};
use desk_core::{Credentials, StreamState, UserIdentity};
use desk_feed::{MarketStreamClient, MarketStreamConfig};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::accept_async;

/// Session API where every endpoint succeeds.
struct AlwaysValidApi;

#[async_trait]
impl SessionApi for AlwaysValidApi {
    async fn session_info(&self) -> AuthResult<UserIdentity> {
        Ok(UserIdentity {
            id: "u-1".to_string(),
            username: "trader".to_string(),
            email: None,
        })
    }

    async fn refresh_session(&self) -> AuthResult<()> {
        Ok(())
    }

    async fn login(&self, _credentials: &Credentials) -> AuthResult<Option<UserIdentity>> {
        Ok(None)
    }

    async fn logout(&self) -> AuthResult<()> {
        Err(AuthError::HttpClient("unreachable".to_string()))
    }
}

#[tokio::test]
async fn test_logout_tears_down_streams_synchronously() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut ws = accept_async(stream).await.unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    let manager = AuthSessionManager::new(AlwaysValidApi, &SessionConfig::new("http://localhost:8000"));

    // Dependents start only after the startup check authenticates.
    let session = manager.check_session().await;
    assert!(session.authenticated);

    let market = MarketStreamClient::subscribe(
        MarketStreamConfig::new(&url, "BTC-USD"),
        &manager.scope_token(),
    );

    timeout(Duration::from_secs(3), async {
        while market.state() != StreamState::Streaming {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stream never connected");

    // Even with the logout endpoint unreachable, the local transition
    // happens and the gated socket is closed with it.
    let session = manager.logout().await;
    assert!(!session.authenticated);
    assert_eq!(market.state(), StreamState::Disconnected);
}
