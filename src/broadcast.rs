use crate::countdown::{now_millis, TICK_INTERVAL_MS};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::store::StoreEvent;
use crate::types::TimestampMs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Map a store change to the messages pushed to clients
pub async fn messages_for_event(state: &AppState, event: StoreEvent) -> Vec<ServerMessage> {
    let server_now = now_millis();
    let mut messages = match event {
        StoreEvent::GameStateChanged(game_state) => vec![ServerMessage::GameState {
            game_state,
            server_now,
        }],
        StoreEvent::PlayerChanged(player) => vec![ServerMessage::PlayerUpdated {
            scenario_text: state.catalog.text_for(&player),
            player,
            server_now,
        }],
        StoreEvent::PlayersCleared => vec![ServerMessage::PlayersCleared],
    };

    // Admin views follow the full list
    if !matches!(messages.first(), Some(ServerMessage::GameState { .. })) {
        match state.store.players().await {
            Ok(list) => messages.push(ServerMessage::Players { list }),
            Err(e) => tracing::warn!("Failed to read players for broadcast: {}", e),
        }
    }
    messages
}

/// Spawn a background task that relays store changes to WebSocket clients
pub fn spawn_store_relay(state: Arc<AppState>) {
    let mut events = state.store.watch();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    for msg in messages_for_event(&state, event).await {
                        state.broadcast_to_all(msg);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Store relay lagged, skipped {} events", skipped);
                    // Resend the full picture so clients catch up
                    resync(&state).await;
                }
                Err(RecvError::Closed) => {
                    tracing::info!("Store event stream closed, stopping relay");
                    break;
                }
            }
        }
    });
}

async fn resync(state: &AppState) {
    match state.snapshot().await {
        Ok(snapshot) => {
            state.broadcast_to_all(ServerMessage::GameState {
                game_state: snapshot.game_state,
                server_now: snapshot.server_now,
            });
            state.broadcast_to_all(ServerMessage::Players {
                list: snapshot.players,
            });
        }
        Err(e) => tracing::error!("Failed to resync clients: {}", e),
    }
}

/// Tracks which deadline has already been announced as ended
#[derive(Debug, Default)]
pub struct RoundEndTracker {
    announced: Option<TimestampMs>,
}

impl RoundEndTracker {
    /// Returns the deadline to announce, once per deadline
    pub fn check(&mut self, round_ends_at: Option<TimestampMs>, now: TimestampMs) -> Option<TimestampMs> {
        let ends_at = round_ends_at?;
        if now >= ends_at && self.announced != Some(ends_at) {
            self.announced = Some(ends_at);
            Some(ends_at)
        } else {
            None
        }
    }
}

/// Spawn a background task announcing `round_ended` when a deadline passes.
///
/// Purely informational: submissions are never closed server-side.
pub fn spawn_round_end_watcher(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut tracker = RoundEndTracker::default();
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));

        loop {
            interval.tick().await;

            let game_state = match state.store.game_state().await {
                Ok(g) => g,
                Err(e) => {
                    tracing::debug!("Round watcher could not read game state: {}", e);
                    continue;
                }
            };
            if !game_state.started {
                continue;
            }

            if let Some(round_ends_at) = tracker.check(game_state.round_ends_at, now_millis()) {
                tracing::info!("Round ending at {} is over", round_ends_at);
                state.broadcast_to_all(ServerMessage::RoundEnded { round_ends_at });
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameState, Player};

    #[test]
    fn test_round_end_announced_once_per_deadline() {
        let mut tracker = RoundEndTracker::default();
        assert_eq!(tracker.check(None, 100), None);
        assert_eq!(tracker.check(Some(1_000), 999), None);
        assert_eq!(tracker.check(Some(1_000), 1_000), Some(1_000));
        assert_eq!(tracker.check(Some(1_000), 2_000), None);
        // A new round is a new deadline
        assert_eq!(tracker.check(Some(5_000), 6_000), Some(5_000));
    }

    #[tokio::test]
    async fn test_player_change_also_sends_full_list() {
        let state = AppState::in_memory();
        let player = state.join_player("Alice").await.unwrap();

        let messages =
            messages_for_event(&state, StoreEvent::PlayerChanged(player.clone())).await;
        assert_eq!(messages.len(), 2);
        assert!(matches!(&messages[0], ServerMessage::PlayerUpdated { player: p, .. } if p.id == player.id));
        assert!(matches!(&messages[1], ServerMessage::Players { list } if list.len() == 1));

        let messages = messages_for_event(
            &state,
            StoreEvent::GameStateChanged(GameState::started(10)),
        )
        .await;
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn test_player_update_carries_prompt_text() {
        let state = AppState::in_memory();
        let mut player = Player::new("p1".to_string(), "Alice".to_string());

        let messages = messages_for_event(&state, StoreEvent::PlayerChanged(player.clone())).await;
        assert!(matches!(
            &messages[0],
            ServerMessage::PlayerUpdated { scenario_text: None, .. }
        ));

        player.scenario_id = Some(4);
        let messages = messages_for_event(&state, StoreEvent::PlayerChanged(player)).await;
        match &messages[0] {
            ServerMessage::PlayerUpdated { scenario_text, .. } => {
                assert_eq!(scenario_text.as_deref(), Some(state.catalog.text(4)));
            }
            other => panic!("Expected player update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relay_forwards_store_writes() {
        let state = Arc::new(AppState::in_memory());
        let mut rx = state.broadcast.subscribe();
        spawn_store_relay(state.clone());

        state
            .store
            .put_player(Player::new("p1".to_string(), "Bob".to_string()))
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, ServerMessage::PlayerUpdated { .. }));
    }
}
