use super::{LocalIdentity, SessionError, Submitter};
use crate::protocol::{
    JoinRequest, JoinResponse, ScenarioEntry, ScenarioList, StartGameResponse, StateSnapshot,
    SubmitRequest, SubmitResponse,
};
use crate::types::Player;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Upper bound on any request, join included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the game API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, SessionError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/api/players/{id}` with the id percent-encoded as one segment
    fn player_url(&self, player_id: &str) -> Result<reqwest::Url, SessionError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| SessionError::Request(format!("Invalid server URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SessionError::Request("Server URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["api", "players", player_id]);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SessionError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| SessionError::Request(e.to_string()));
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("Unknown error").to_string(),
        };
        Err(SessionError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    /// Enroll under `name`. Blank names are rejected before any request.
    pub async fn join(&self, name: &str) -> Result<Player, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::Validation("Please enter your name".to_string()));
        }

        let result = self
            .client
            .post(self.url("/api/join"))
            .json(&JoinRequest {
                name: name.to_string(),
            })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(SessionError::JoinTimeout(self.timeout.as_secs())),
            Err(e) => return Err(SessionError::JoinFailure(e.to_string())),
        };

        match Self::read::<JoinResponse>(response).await {
            Ok(joined) => Ok(joined.player),
            Err(SessionError::Rejected { status, .. })
                if status == StatusCode::GATEWAY_TIMEOUT.as_u16() =>
            {
                Err(SessionError::JoinTimeout(self.timeout.as_secs()))
            }
            Err(SessionError::Rejected { message, .. }) => Err(SessionError::JoinFailure(message)),
            Err(e) => Err(e),
        }
    }

    /// Fetch a player record, None if it no longer exists
    pub async fn player(&self, player_id: &str) -> Result<Option<Player>, SessionError> {
        let response = self
            .client
            .get(self.player_url(player_id)?)
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read(response).await.map(Some)
    }

    pub async fn submit_response(
        &self,
        player_id: &str,
        response: &str,
    ) -> Result<SubmitResponse, SessionError> {
        let response = self
            .client
            .post(self.url("/api/submit-response"))
            .json(&SubmitRequest {
                player_id: Some(player_id.to_string()),
                response: Some(response.to_string()),
            })
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;
        Self::read(response).await
    }

    pub async fn start_game(&self) -> Result<StartGameResponse, SessionError> {
        let response = self
            .client
            .post(self.url("/api/start-game"))
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;
        Self::read(response).await
    }

    pub async fn reset_game(&self) -> Result<(), SessionError> {
        let response = self
            .client
            .post(self.url("/api/reset-game"))
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;
        Self::read::<serde_json::Value>(response).await.map(|_| ())
    }

    pub async fn scenarios(&self) -> Result<Vec<ScenarioEntry>, SessionError> {
        let response = self
            .client
            .get(self.url("/api/scenarios"))
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;
        Self::read::<ScenarioList>(response).await.map(|list| list.scenarios)
    }

    pub async fn state(&self) -> Result<StateSnapshot, SessionError> {
        let response = self
            .client
            .get(self.url("/api/state"))
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;
        Self::read(response).await
    }

    /// Check the admin PIN
    pub async fn admin_login(&self, pin: &str) -> Result<bool, SessionError> {
        let response = self
            .client
            .post(self.url("/api/admin/login"))
            .json(&json!({ "pin": pin }))
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Ok(false),
            _ => Self::read::<serde_json::Value>(response).await.map(|_| true),
        }
    }
}

#[async_trait]
impl Submitter for ApiClient {
    async fn submit(&self, player_id: &str, response: &str) -> Result<(), SessionError> {
        self.submit_response(player_id, response).await.map(|_| ())
    }
}

/// Resume the player stored in `identity`, or join as `name` if there is
/// none (or its record is gone). The identity is updated either way.
pub async fn join_or_resume(
    client: &ApiClient,
    identity: &LocalIdentity,
    name: &str,
) -> Result<Player, SessionError> {
    let stored = identity.load().await.unwrap_or_else(|e| {
        tracing::warn!("Failed to read stored identity: {}", e);
        None
    });

    if let Some(id) = stored {
        match client.player(&id).await? {
            Some(player) => {
                tracing::info!("Resuming as player {}", player.id);
                return Ok(player);
            }
            None => {
                tracing::info!("Stored player {} no longer exists", id);
                if let Err(e) = identity.clear().await {
                    tracing::warn!("Failed to clear stored identity: {}", e);
                }
            }
        }
    }

    let player = client.join(name).await?;
    if let Err(e) = identity.save(&player.id).await {
        tracing::warn!("Failed to persist player identity: {}", e);
    }
    Ok(player)
}
