//! WebSocket push channel. Replaces polling: every client subscribes once
//! and receives state changes as they land in the store.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::countdown::now_millis;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{PlayerId, Role};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    pub role: Option<String>,
    pub player_id: Option<PlayerId>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: role={:?}, player_id={:?}",
        params.role,
        params.player_id
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Decide whether (and as what) a broadcast reaches a given subscriber
pub fn route_message(
    role: Role,
    player_id: Option<&str>,
    msg: &ServerMessage,
) -> Option<ServerMessage> {
    match (role, msg) {
        (Role::Admin, _) => Some(msg.clone()),
        (Role::Player, ServerMessage::PlayerUpdated { player, .. }) => {
            (Some(player.id.as_str()) == player_id).then(|| msg.clone())
        }
        (Role::Player, ServerMessage::Players { .. }) => None,
        (Role::Player, ServerMessage::PlayersCleared) => {
            player_id.map(|_| ServerMessage::PlayerRemoved)
        }
        (Role::Player, _) => Some(msg.clone()),
    }
}

async fn welcome_messages(
    state: &AppState,
    role: Role,
    player_id: Option<&str>,
) -> Vec<ServerMessage> {
    let game_state = match state.store.game_state().await {
        Ok(g) => g,
        Err(e) => {
            tracing::error!("Failed to read game state for welcome: {}", e);
            return vec![ServerMessage::Error {
                code: "STORE_ERROR".to_string(),
                msg: "Failed to load game state".to_string(),
            }];
        }
    };

    let (players, missing_player) = match (role, player_id) {
        (Role::Admin, _) => (state.store.players().await.unwrap_or_default(), false),
        (Role::Player, Some(id)) => match state.store.player(id).await {
            Ok(Some(player)) => (vec![player], false),
            Ok(None) => (vec![], true),
            Err(e) => {
                tracing::warn!("Failed to read player {}: {}", id, e);
                (vec![], false)
            }
        },
        (Role::Player, None) => (vec![], false),
    };

    let scenario_text = match role {
        Role::Player => players.first().and_then(|p| state.catalog.text_for(p)),
        Role::Admin => None,
    };

    let mut messages = vec![ServerMessage::Welcome {
        role,
        game_state,
        players,
        scenario_text,
        server_now: now_millis(),
    }];
    if missing_player {
        // Stale identity, e.g. after a reset
        messages.push(ServerMessage::PlayerRemoved);
    }
    messages
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::error!("Failed to serialize {:?}: {}", msg, e);
            Ok(())
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let role = match params.role.as_deref() {
        Some("admin") => Role::Admin,
        _ => Role::Player,
    };
    let player_id = params.player_id.filter(|id| !id.is_empty());

    tracing::info!("WebSocket connected with role: {:?}", role);

    // Subscribe before reading the welcome snapshot so no change slips between
    let mut broadcast_rx = state.broadcast.subscribe();

    for msg in welcome_messages(&state, role, player_id.as_deref()).await {
        if send_json(&mut sender, &msg).await.is_err() {
            tracing::error!("Failed to send welcome message");
            return;
        }
    }

    loop {
        tokio::select! {
            broadcast_msg = broadcast_rx.recv() => {
                match broadcast_msg {
                    Ok(msg) => {
                        if let Some(msg) = route_message(role, player_id.as_deref(), &msg) {
                            if send_json(&mut sender, &msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "WebSocket client lagged, skipped {} messages; resending snapshot",
                            skipped
                        );
                        let mut failed = false;
                        for msg in welcome_messages(&state, role, player_id.as_deref()).await {
                            if send_json(&mut sender, &msg).await.is_err() {
                                failed = true;
                                break;
                            }
                        }
                        if failed {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::SyncClock) => ServerMessage::Clock {
                                server_now: now_millis(),
                            },
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                }
                            }
                        };
                        if send_json(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed for role: {:?}", role);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameState, Player};

    fn player_update(id: &str) -> ServerMessage {
        ServerMessage::PlayerUpdated {
            player: Player::new(id.to_string(), "x".to_string()),
            scenario_text: None,
            server_now: 0,
        }
    }

    #[test]
    fn test_players_only_see_their_own_record() {
        assert!(route_message(Role::Player, Some("me"), &player_update("me")).is_some());
        assert!(route_message(Role::Player, Some("me"), &player_update("you")).is_none());
        assert!(route_message(Role::Player, None, &player_update("you")).is_none());
        assert!(route_message(
            Role::Player,
            Some("me"),
            &ServerMessage::Players { list: vec![] }
        )
        .is_none());
    }

    #[test]
    fn test_reset_becomes_player_removed() {
        let routed = route_message(Role::Player, Some("me"), &ServerMessage::PlayersCleared);
        assert!(matches!(routed, Some(ServerMessage::PlayerRemoved)));
        assert!(route_message(Role::Player, None, &ServerMessage::PlayersCleared).is_none());
    }

    #[test]
    fn test_admin_sees_everything() {
        assert!(route_message(Role::Admin, None, &player_update("anyone")).is_some());
        assert!(route_message(Role::Admin, None, &ServerMessage::Players { list: vec![] }).is_some());
        let game = ServerMessage::GameState {
            game_state: GameState::default(),
            server_now: 0,
        };
        assert!(route_message(Role::Player, Some("me"), &game).is_some());
    }

    #[tokio::test]
    async fn test_welcome_flags_stale_identity() {
        let state = AppState::in_memory();
        let messages = welcome_messages(&state, Role::Player, Some("gone")).await;
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[1], ServerMessage::PlayerRemoved));

        let player = state.join_player("Alice").await.unwrap();
        let messages = welcome_messages(&state, Role::Player, Some(&player.id)).await;
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            &messages[0],
            ServerMessage::Welcome { players, scenario_text: None, .. } if players.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_player_welcome_includes_prompt_text() {
        let state = AppState::in_memory();
        let player = state.join_player("Alice").await.unwrap();
        state.start_round().await.unwrap();
        let dealt = state.get_player(&player.id).await.unwrap();
        let expected = state.catalog.text_for(&dealt);
        assert!(expected.is_some());

        match &welcome_messages(&state, Role::Player, Some(&player.id)).await[0] {
            ServerMessage::Welcome { scenario_text, .. } => assert_eq!(scenario_text, &expected),
            other => panic!("Expected welcome, got {:?}", other),
        }
        match &welcome_messages(&state, Role::Admin, None).await[0] {
            ServerMessage::Welcome { scenario_text, players, .. } => {
                assert!(scenario_text.is_none());
                assert_eq!(players.len(), 1);
            }
            other => panic!("Expected welcome, got {:?}", other),
        }
    }
}
