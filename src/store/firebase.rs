//! Firebase Realtime Database adapter over its REST API.
//!
//! Batches are sent as a single multi-path `PATCH` against the database
//! root, which Firebase applies atomically. Change events are an echo of
//! this process's own successful writes; writes made by other processes
//! are not observed.

use super::{Store, StoreError, StoreEvent, StoreResult, Update};
use crate::types::{GameState, Player, PlayerId};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;

const GAME_STATE_PATH: &str = "gameState";
const PLAYERS_PATH: &str = "players";

/// Firebase keys may not contain these characters
const FORBIDDEN_KEY_CHARS: &[char] = &['.', '#', '$', '[', ']', '/'];

pub struct FirebaseStore {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
    events: broadcast::Sender<StoreEvent>,
}

impl FirebaseStore {
    pub fn new(
        database_url: &str,
        auth: Option<String>,
        request_timeout: Duration,
    ) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let (tx, _rx) = broadcast::channel(256);

        Ok(Self {
            client,
            base_url: database_url.trim_end_matches('/').to_string(),
            auth,
            events: tx,
        })
    }

    /// REST URL for a database path, each segment percent-encoded
    fn url(&self, path: &str) -> StoreResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| StoreError::Backend(format!("Invalid database URL: {}", e)))?;
        {
            let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
            let last = format!("{}.json", parts.pop().unwrap_or(""));
            url.path_segments_mut()
                .map_err(|_| StoreError::Backend("Database URL cannot carry a path".to_string()))?
                .pop_if_empty()
                .extend(parts)
                .push(&last);
        }
        if let Some(ref auth) = self.auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> StoreResult<Option<T>> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!(
                "GET {} returned {}: {}",
                path, status, body
            )));
        }

        let value: Value = response.json().await.map_err(map_request_error)?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn patch_root(&self, body: Map<String, Value>) -> StoreResult<()> {
        let response = self
            .client
            .patch(self.url("")?)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!(
                "PATCH returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

fn map_request_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else if e.is_decode() {
        StoreError::Serialization(e.to_string())
    } else {
        StoreError::Backend(e.to_string())
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(FORBIDDEN_KEY_CHARS) && !key.chars().any(char::is_control)
}

fn player_path(id: &str) -> StoreResult<String> {
    if is_valid_key(id) {
        Ok(format!("{}/{}", PLAYERS_PATH, id))
    } else {
        Err(StoreError::Backend(format!("Invalid player key: {:?}", id)))
    }
}

/// Flatten one update into `path -> value` entries for a multi-path patch
fn update_paths(update: &Update) -> StoreResult<Vec<(String, Value)>> {
    Ok(match update {
        Update::SetGameState(state) => vec![(GAME_STATE_PATH.to_string(), to_value(state)?)],
        Update::PutPlayer(player) => vec![(player_path(&player.id)?, to_value(player)?)],
        Update::AssignScenario { id, scenario_id } => {
            let base = player_path(id)?;
            vec![
                (format!("{}/scenarioId", base), json!(scenario_id)),
                (format!("{}/response", base), json!("")),
                (format!("{}/submitted", base), json!(false)),
            ]
        }
        Update::SubmitResponse { id, response } => {
            let base = player_path(id)?;
            vec![
                (format!("{}/response", base), json!(response)),
                (format!("{}/submitted", base), json!(true)),
            ]
        }
        Update::RemoveAllPlayers => vec![(PLAYERS_PATH.to_string(), Value::Null)],
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl Store for FirebaseStore {
    async fn game_state(&self) -> StoreResult<GameState> {
        Ok(self
            .get_json::<GameState>(GAME_STATE_PATH)
            .await?
            .unwrap_or_default())
    }

    async fn players(&self) -> StoreResult<Vec<Player>> {
        let map = self
            .get_json::<HashMap<PlayerId, Player>>(PLAYERS_PATH)
            .await?
            .unwrap_or_default();
        let mut players: Vec<Player> = map.into_values().collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(players)
    }

    async fn player(&self, id: &str) -> StoreResult<Option<Player>> {
        if !is_valid_key(id) {
            return Ok(None);
        }
        self.get_json(&format!("{}/{}", PLAYERS_PATH, id)).await
    }

    async fn allocate_player_id(&self) -> StoreResult<PlayerId> {
        // Push keys are generated client-side, like the Firebase SDKs do
        Ok(ulid::Ulid::new().to_string())
    }

    async fn apply(&self, batch: Vec<Update>) -> StoreResult<()> {
        let mut body = Map::new();
        for update in &batch {
            for (path, value) in update_paths(update)? {
                body.insert(path, value);
            }
        }

        self.patch_root(body).await?;

        for update in batch {
            let event = match update {
                Update::SetGameState(state) => Some(StoreEvent::GameStateChanged(state)),
                Update::PutPlayer(player) => Some(StoreEvent::PlayerChanged(player)),
                Update::AssignScenario { id, .. } | Update::SubmitResponse { id, .. } => {
                    match self.player(&id).await {
                        Ok(Some(player)) => Some(StoreEvent::PlayerChanged(player)),
                        Ok(None) => None,
                        Err(e) => {
                            tracing::warn!("Failed to read back player {}: {}", id, e);
                            None
                        }
                    }
                }
                Update::RemoveAllPlayers => Some(StoreEvent::PlayersCleared),
            };
            if let Some(event) = event {
                let _ = self.events.send(event);
            }
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn name(&self) -> &str {
        "firebase"
    }
}
