//! Request/response client for the room server's REST surface.
//!
//! A non-realtime integration path: sessions are created, voted on and
//! revealed with plain JSON calls instead of the push connection.
//!
//! ```rust,no_run
//! use poker_room_client::http::RestClient;
//! use poker_room_client::protocol::ConsensusRule;
//!
//! # async fn demo() -> poker_room_client::error::Result<()> {
//! let api = RestClient::new("http://127.0.0.1:5001/api");
//! let session = api
//!     .create_session("Sprint 12", &["alice", "bob"], ConsensusRule::Strict)
//!     .await?;
//! api.submit_vote(&session, "alice", "5").await?;
//! let reveal = api.reveal_votes(&session).await?;
//! println!("validated: {}", reveal.validated);
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PokerRoomError, Result};
use crate::protocol::{ConsensusRule, VoteMap};

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    session_name: &'a str,
    players: &'a [&'a str],
    rule: ConsensusRule,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct VoteRequest<'a> {
    session_id: &'a str,
    player: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct RuleRequest<'a> {
    session_id: &'a str,
    rule: ConsensusRule,
}

#[derive(Debug, Deserialize)]
struct Ack {
    success: bool,
    #[serde(default, alias = "error")]
    message: Option<String>,
}

/// Outcome of a REST reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealResult {
    #[serde(default)]
    pub votes: VoteMap,
    /// Whether the round reached consensus under the session's rule.
    #[serde(default)]
    pub validated: bool,
}

/// Client for the REST endpoints under one base URL.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:5001/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing connection pool.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a session and return its id.
    ///
    /// # Errors
    ///
    /// [`PokerRoomError::Http`] on a transport failure or non-2xx status.
    pub async fn create_session(
        &self,
        session_name: &str,
        players: &[&str],
        rule: ConsensusRule,
    ) -> Result<String> {
        let body = CreateSessionRequest {
            session_name,
            players,
            rule,
        };
        let created: CreateSessionResponse = self.post("/session/create", &body).await?;
        debug!(session_id = %created.session_id, "session created");
        Ok(created.session_id)
    }

    /// Record `player`'s vote.
    ///
    /// # Errors
    ///
    /// [`PokerRoomError::Http`] on a transport failure or non-2xx status, and
    /// [`PokerRoomError::ServerError`] when the server refuses the vote.
    pub async fn submit_vote(&self, session_id: &str, player: &str, value: &str) -> Result<()> {
        let body = VoteRequest {
            session_id,
            player,
            value,
        };
        let ack: Ack = self.post("/vote", &body).await?;
        ack.into_result("vote rejected")
    }

    /// Reveal the session's votes.
    ///
    /// # Errors
    ///
    /// [`PokerRoomError::Http`] on a transport failure or non-2xx status.
    pub async fn reveal_votes(&self, session_id: &str) -> Result<RevealResult> {
        let response = self
            .http
            .get(self.url("/votes/reveal"))
            .query(&[("session_id", session_id)])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Change the session's consensus rule.
    ///
    /// # Errors
    ///
    /// [`PokerRoomError::Http`] on a transport failure or non-2xx status, and
    /// [`PokerRoomError::ServerError`] when the server refuses the change.
    pub async fn set_consensus_rule(&self, session_id: &str, rule: ConsensusRule) -> Result<()> {
        let ack: Ack = self
            .post("/session/rule", &RuleRequest { session_id, rule })
            .await?;
        ack.into_result("rule change rejected")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

impl Ack {
    fn into_result(self, fallback: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(PokerRoomError::ServerError {
                message: self.message.unwrap_or_else(|| fallback.to_string()),
            })
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct ServerState {
        requests: Arc<Mutex<Vec<Value>>>,
    }

    async fn create(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
        state.requests.lock().await.push(body);
        Json(json!({"session_id": "7f0c1d2e"}))
    }

    async fn vote(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
        let accepted = body["session_id"] == "7f0c1d2e";
        state.requests.lock().await.push(body);
        Json(json!({"success": accepted}))
    }

    async fn reveal(Query(query): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        match query.get("session_id").map(String::as_str) {
            Some("7f0c1d2e") => (
                StatusCode::OK,
                Json(json!({"votes": {"alice": "5", "bob": "5"}, "validated": true})),
            ),
            _ => (StatusCode::NOT_FOUND, Json(json!({}))),
        }
    }

    async fn rule(Json(body): Json<Value>) -> Json<Value> {
        if body["rule"] == "median" {
            Json(json!({"success": true}))
        } else {
            Json(json!({"success": false, "error": "unsupported rule"}))
        }
    }

    async fn spawn_api() -> (RestClient, ServerState) {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = ServerState::default();
        let app = Router::new()
            .route("/api/session/create", post(create))
            .route("/api/vote", post(vote))
            .route("/api/votes/reveal", get(reveal))
            .route("/api/session/rule", post(rule))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (RestClient::new(format!("http://{addr}/api/")), state)
    }

    #[tokio::test]
    async fn create_session_posts_players_and_rule() {
        let (api, state) = spawn_api().await;
        let id = api
            .create_session("Sprint 12", &["alice", "bob"], ConsensusRule::Average)
            .await
            .unwrap();

        assert_eq!(id, "7f0c1d2e");
        assert_eq!(
            state.requests.lock().await[0],
            json!({"session_name": "Sprint 12", "players": ["alice", "bob"], "rule": "average"})
        );
    }

    #[tokio::test]
    async fn vote_refusal_is_server_error() {
        let (api, _state) = spawn_api().await;
        tokio_test::assert_ok!(api.submit_vote("7f0c1d2e", "alice", "5").await);

        let err = api.submit_vote("unknown", "alice", "5").await.unwrap_err();
        assert!(matches!(err, PokerRoomError::ServerError { message } if message == "vote rejected"));
    }

    #[tokio::test]
    async fn reveal_returns_votes() {
        let (api, _state) = spawn_api().await;
        let reveal = api.reveal_votes("7f0c1d2e").await.unwrap();
        assert!(reveal.validated);
        assert_eq!(reveal.votes.get("bob").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn non_success_status_is_http_error() {
        let (api, _state) = spawn_api().await;
        let err = api.reveal_votes("missing").await.unwrap_err();
        assert!(matches!(err, PokerRoomError::Http(_)));
    }

    #[tokio::test]
    async fn rule_refusal_carries_server_message() {
        let (api, _state) = spawn_api().await;
        tokio_test::assert_ok!(api.set_consensus_rule("7f0c1d2e", ConsensusRule::Median).await);

        let err = api
            .set_consensus_rule("7f0c1d2e", ConsensusRule::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, PokerRoomError::ServerError { message } if message == "unsupported rule"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        assert_eq!(
            RestClient::new("http://localhost:5001/api/").base_url(),
            "http://localhost:5001/api"
        );
    }
}
