use serde::{Deserialize, Serialize};

/// Opaque player identity, allocated by the store
pub type PlayerId = String;

/// Index into the scenario catalog (1-based)
pub type ScenarioId = u8;

/// Milliseconds since the Unix epoch
pub type TimestampMs = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// None until a round starts
    #[serde(default)]
    pub scenario_id: Option<ScenarioId>,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub submitted: bool,
}

impl Player {
    /// Fresh record for a player who just joined
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            scenario_id: None,
            response: String::new(),
            submitted: false,
        }
    }
}

/// Singleton game state. `round_ends_at` is set iff `started` is true.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub round_ends_at: Option<TimestampMs>,
}

impl GameState {
    pub fn started(round_ends_at: TimestampMs) -> Self {
        Self {
            started: true,
            round_ends_at: Some(round_ends_at),
        }
    }

    /// Whether a round is running and its deadline has not passed yet
    pub fn is_active_at(&self, now: TimestampMs) -> bool {
        match self.round_ends_at {
            Some(ends_at) => self.started && ends_at > now,
            None => false,
        }
    }
}

/// Status shown on the admin dashboard
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Waiting,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Player,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_json_shape() {
        let player = Player::new("p1".to_string(), "Alice".to_string());
        let json = serde_json::to_value(&player).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "p1",
                "name": "Alice",
                "scenarioId": null,
                "response": "",
                "submitted": false
            })
        );
    }

    #[test]
    fn test_game_state_default_is_unstarted() {
        let state = GameState::default();
        assert!(!state.started);
        assert!(state.round_ends_at.is_none());
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            serde_json::json!({"started": false, "roundEndsAt": null})
        );
    }

    #[test]
    fn test_game_state_active_window() {
        let state = GameState::started(10_000);
        assert!(state.is_active_at(9_999));
        assert!(!state.is_active_at(10_000));
        assert!(!GameState::default().is_active_at(0));
    }
}
