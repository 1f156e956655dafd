use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for a fresh server clock reading
    SyncClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        role: Role,
        #[serde(rename = "gameState")]
        game_state: GameState,
        /// Admins get the full list, players only their own record
        players: Vec<Player>,
        /// Text of the player's own prompt, if one is dealt
        #[serde(
            rename = "scenarioText",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        scenario_text: Option<String>,
        #[serde(rename = "serverNow")]
        server_now: TimestampMs,
    },
    GameState {
        #[serde(rename = "gameState")]
        game_state: GameState,
        #[serde(rename = "serverNow")]
        server_now: TimestampMs,
    },
    PlayerUpdated {
        player: Player,
        #[serde(
            rename = "scenarioText",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        scenario_text: Option<String>,
        #[serde(rename = "serverNow")]
        server_now: TimestampMs,
    },
    /// Full player list (admin view)
    Players {
        list: Vec<Player>,
    },
    /// Every player record was removed (game reset)
    PlayersCleared,
    /// Sent when a player's own record disappears
    PlayerRemoved,
    RoundEnded {
        #[serde(rename = "roundEndsAt")]
        round_ends_at: TimestampMs,
    },
    Clock {
        #[serde(rename = "serverNow")]
        server_now: TimestampMs,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Body of `POST /api/join`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub success: bool,
    pub player_id: PlayerId,
    pub player: Player,
}

/// Body of `POST /api/submit-response`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(default)]
    pub already_submitted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameResponse {
    pub success: bool,
    pub round_ends_at: TimestampMs,
    pub player_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    pub pin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub game_state: GameState,
    pub players: Vec<Player>,
    pub server_now: TimestampMs,
}

/// Admin dashboard summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub status: RoundStatus,
    pub game_state: GameState,
    pub players: Vec<Player>,
    pub submitted_count: usize,
    pub missing_count: usize,
    pub remaining_seconds: u64,
    /// `remaining_seconds` as `m:ss`
    pub clock: String,
    /// The catalog, so prompt ids can be shown as text
    pub scenarios: Vec<ScenarioEntry>,
    pub server_now: TimestampMs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioEntry {
    pub id: ScenarioId,
    pub text: String,
}

/// Body of `GET /api/scenarios`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioList {
    pub scenarios: Vec<ScenarioEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_tagging() {
        let msg = ServerMessage::GameState {
            game_state: GameState::started(5_000),
            server_now: 1_000,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "game_state");
        assert_eq!(json["gameState"]["roundEndsAt"], 5_000);
        assert_eq!(json["serverNow"], 1_000);
    }

    #[test]
    fn test_submit_request_tolerates_missing_fields() {
        let req: SubmitRequest = serde_json::from_str("{}").unwrap();
        assert!(req.player_id.is_none());
        assert!(req.response.is_none());

        let req: SubmitRequest =
            serde_json::from_str(r#"{"playerId": "p1", "response": "hi"}"#).unwrap();
        assert_eq!(req.player_id.as_deref(), Some("p1"));
        assert_eq!(req.response.as_deref(), Some("hi"));
    }

    #[test]
    fn test_scenario_text_only_serialized_when_known() {
        let mut player = Player::new("p1".to_string(), "Alice".to_string());
        let bare = ServerMessage::PlayerUpdated {
            player: player.clone(),
            scenario_text: None,
            server_now: 0,
        };
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("scenarioText").is_none());

        player.scenario_id = Some(2);
        let dealt = ServerMessage::PlayerUpdated {
            player,
            scenario_text: Some("Prompt two".to_string()),
            server_now: 0,
        };
        let json = serde_json::to_value(&dealt).unwrap();
        assert_eq!(json["scenarioText"], "Prompt two");
        assert_eq!(json["player"]["scenarioId"], 2);
    }

    #[test]
    fn test_client_message_parse() {
        let msg: ClientMessage = serde_json::from_str(r#"{"t": "sync_clock"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::SyncClock));
    }
}
