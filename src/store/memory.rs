use super::{Store, StoreEvent, StoreResult, Update};
use crate::types::{GameState, Player, PlayerId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

#[derive(Debug, Default)]
struct Inner {
    game_state: GameState,
    players: HashMap<PlayerId, Player>,
}

/// Process-local store. A batch is applied under a single write lock, so
/// readers never observe it half-applied.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            events: tx,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn game_state(&self) -> StoreResult<GameState> {
        Ok(self.inner.read().await.game_state.clone())
    }

    async fn players(&self) -> StoreResult<Vec<Player>> {
        let inner = self.inner.read().await;
        let mut players: Vec<Player> = inner.players.values().cloned().collect();
        // ULIDs sort by creation time
        players.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(players)
    }

    async fn player(&self, id: &str) -> StoreResult<Option<Player>> {
        Ok(self.inner.read().await.players.get(id).cloned())
    }

    async fn allocate_player_id(&self) -> StoreResult<PlayerId> {
        Ok(ulid::Ulid::new().to_string())
    }

    async fn apply(&self, batch: Vec<Update>) -> StoreResult<()> {
        let mut events = Vec::with_capacity(batch.len());
        {
            let mut inner = self.inner.write().await;
            for update in batch {
                match update {
                    Update::SetGameState(state) => {
                        inner.game_state = state.clone();
                        events.push(StoreEvent::GameStateChanged(state));
                    }
                    Update::PutPlayer(player) => {
                        inner.players.insert(player.id.clone(), player.clone());
                        events.push(StoreEvent::PlayerChanged(player));
                    }
                    Update::AssignScenario { id, scenario_id } => {
                        match inner.players.get_mut(&id) {
                            Some(player) => {
                                player.scenario_id = Some(scenario_id);
                                player.response.clear();
                                player.submitted = false;
                                events.push(StoreEvent::PlayerChanged(player.clone()));
                            }
                            None => tracing::debug!("Skipping scenario for missing player {}", id),
                        }
                    }
                    Update::SubmitResponse { id, response } => match inner.players.get_mut(&id) {
                        Some(player) => {
                            player.response = response;
                            player.submitted = true;
                            events.push(StoreEvent::PlayerChanged(player.clone()));
                        }
                        None => tracing::debug!("Skipping response for missing player {}", id),
                    },
                    Update::RemoveAllPlayers => {
                        inner.players.clear();
                        events.push(StoreEvent::PlayersCleared);
                    }
                }
            }
        }

        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_player() {
        let store = MemoryStore::new();
        let id = store.allocate_player_id().await.unwrap();
        store
            .put_player(Player::new(id.clone(), "Alice".to_string()))
            .await
            .unwrap();

        let player = store.player(&id).await.unwrap().unwrap();
        assert_eq!(player.name, "Alice");
        assert_eq!(store.players().await.unwrap().len(), 1);
        assert!(store.player("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_allocated_ids_are_unique() {
        let store = MemoryStore::new();
        let a = store.allocate_player_id().await.unwrap();
        let b = store.allocate_player_id().await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_assign_scenario_resets_round_fields() {
        let store = MemoryStore::new();
        let mut player = Player::new("p1".to_string(), "Bob".to_string());
        player.response = "old".to_string();
        player.submitted = true;
        store.put_player(player).await.unwrap();

        store
            .apply(vec![Update::AssignScenario {
                id: "p1".to_string(),
                scenario_id: 4,
            }])
            .await
            .unwrap();

        let player = store.player("p1").await.unwrap().unwrap();
        assert_eq!(player.scenario_id, Some(4));
        assert_eq!(player.response, "");
        assert!(!player.submitted);
    }

    #[tokio::test]
    async fn test_updates_for_missing_players_do_not_create_records() {
        let store = MemoryStore::new();
        store
            .apply(vec![
                Update::AssignScenario {
                    id: "ghost".to_string(),
                    scenario_id: 1,
                },
                Update::SubmitResponse {
                    id: "ghost".to_string(),
                    response: "boo".to_string(),
                },
            ])
            .await
            .unwrap();

        assert!(store.players().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watch_emits_events_in_batch_order() {
        let store = MemoryStore::new();
        let mut rx = store.watch();

        store
            .apply(vec![
                Update::PutPlayer(Player::new("p1".to_string(), "Carol".to_string())),
                Update::SetGameState(GameState::started(1_000)),
                Update::RemoveAllPlayers,
            ])
            .await
            .unwrap();

        assert!(matches!(rx.recv().await.unwrap(), StoreEvent::PlayerChanged(p) if p.id == "p1"));
        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::GameStateChanged(GameState::started(1_000))
        );
        assert_eq!(rx.recv().await.unwrap(), StoreEvent::PlayersCleared);
    }
}
