//! Player-side session: local view of one player's round, the draft they
//! are typing, and the exactly-once auto-submit when time runs out.

mod client;
mod driver;
mod identity;

pub use client::{join_or_resume, ApiClient};
pub use driver::{spawn_countdown, submit_now, tick_once};
pub use identity::LocalIdentity;

use crate::countdown::{format_clock, remaining_seconds, ClockOffset};
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::*;
use async_trait::async_trait;

/// Sent when time runs out with nothing typed
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("Response is locked")]
    Locked,

    #[error("No round in progress for this player")]
    NotInRound,

    #[error("Failed to join: {0}")]
    JoinFailure(String),

    #[error("Failed to join: request timed out after {0}s. Check your connection and the server's database configuration.")]
    JoinTimeout(u64),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// A submission the session decided to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitIntent {
    pub player_id: PlayerId,
    pub response: String,
    /// Fired by the countdown rather than the player
    pub automatic: bool,
    /// Deadline of the round the intent belongs to
    pub round_ends_at: Option<TimestampMs>,
}

/// What the player should currently be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Joined, waiting for a round (or joined too late for the current one)
    Lobby,
    Playing,
}

/// Where submissions go
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, player_id: &str, response: &str) -> Result<(), SessionError>;
}

#[async_trait]
impl Submitter for AppState {
    async fn submit(&self, player_id: &str, response: &str) -> Result<(), SessionError> {
        self.submit_response(player_id, Some(response.to_string()))
            .await
            .map(|_| ())
            .map_err(|e: GameError| SessionError::Rejected {
                status: e.status_code().as_u16(),
                message: e.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct PlayerSession {
    player_id: PlayerId,
    name: String,
    scenario_id: Option<ScenarioId>,
    scenario_text: Option<String>,
    draft: String,
    submitted: bool,
    started: bool,
    /// Identity of the current round
    round_ends_at: Option<TimestampMs>,
    /// A submission is on its way
    pending: bool,
    /// Auto-submit already fired for the current round
    auto_fired: bool,
    /// The player record is gone (game reset)
    removed: bool,
    clock: ClockOffset,
}

impl PlayerSession {
    pub fn new(player: &Player) -> Self {
        Self {
            player_id: player.id.clone(),
            name: player.name.clone(),
            scenario_id: player.scenario_id,
            scenario_text: None,
            draft: if player.submitted {
                player.response.clone()
            } else {
                String::new()
            },
            submitted: player.submitted,
            started: false,
            round_ends_at: None,
            pending: false,
            auto_fired: false,
            removed: false,
            clock: ClockOffset::default(),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scenario_id(&self) -> Option<ScenarioId> {
        self.scenario_id
    }

    /// Prompt text as sent by the server
    pub fn scenario_text(&self) -> Option<&str> {
        self.scenario_text.as_deref()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn round_ends_at(&self) -> Option<TimestampMs> {
        self.round_ends_at
    }

    pub fn clock(&self) -> ClockOffset {
        self.clock
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.removed
            && self.started
            && self.round_ends_at.is_some()
            && self.scenario_id.is_some()
        {
            SessionPhase::Playing
        } else {
            SessionPhase::Lobby
        }
    }

    /// Record a server clock reading taken at `local_now`
    pub fn sync_clock(&mut self, server_now: TimestampMs, local_now: TimestampMs) {
        self.clock = ClockOffset::from_sample(server_now, local_now);
    }

    /// Apply the latest game state. A different deadline means a new round.
    pub fn apply_game_state(&mut self, game_state: &GameState) {
        if game_state.round_ends_at != self.round_ends_at {
            // The first round seen keeps a response restored from the record
            if self.round_ends_at.is_some() {
                self.draft.clear();
            }
            self.round_ends_at = game_state.round_ends_at;
            self.pending = false;
            self.auto_fired = false;
        }
        self.started = game_state.started;
    }

    /// Apply the latest copy of this player's record
    pub fn apply_player(&mut self, player: &Player) {
        if player.id != self.player_id {
            return;
        }
        if player.scenario_id != self.scenario_id {
            self.scenario_text = None;
        }
        self.name = player.name.clone();
        self.scenario_id = player.scenario_id;
        self.removed = false;
        if player.submitted {
            self.submitted = true;
            self.pending = false;
            self.draft = player.response.clone();
        } else if !self.pending {
            if self.submitted {
                // Record was reset for a new round
                self.draft.clear();
            }
            self.submitted = false;
        }
    }

    /// Fold one push message into the session. `local_now` is when it
    /// arrived; every message carrying `serverNow` resyncs the clock.
    pub fn apply_message(&mut self, msg: &ServerMessage, local_now: TimestampMs) {
        match msg {
            ServerMessage::Welcome {
                game_state,
                players,
                scenario_text,
                server_now,
                ..
            } => {
                self.sync_clock(*server_now, local_now);
                if let Some(player) = players.iter().find(|p| p.id == self.player_id) {
                    self.apply_player(player);
                    self.scenario_text = scenario_text.clone();
                }
                self.apply_game_state(game_state);
            }
            ServerMessage::GameState {
                game_state,
                server_now,
            } => {
                self.sync_clock(*server_now, local_now);
                self.apply_game_state(game_state);
            }
            ServerMessage::PlayerUpdated {
                player,
                scenario_text,
                server_now,
            } => {
                self.sync_clock(*server_now, local_now);
                if player.id == self.player_id {
                    self.apply_player(player);
                    self.scenario_text = scenario_text.clone();
                }
            }
            ServerMessage::Players { list } => {
                if let Some(player) = list.iter().find(|p| p.id == self.player_id) {
                    self.apply_player(player);
                }
            }
            ServerMessage::PlayersCleared | ServerMessage::PlayerRemoved => {
                tracing::info!("Player {} was removed from the game", self.player_id);
                self.removed = true;
                self.pending = false;
            }
            ServerMessage::Clock { server_now } => self.sync_clock(*server_now, local_now),
            ServerMessage::RoundEnded { .. } => {}
            ServerMessage::Error { code, msg } => {
                tracing::warn!("Server reported {}: {}", code, msg);
            }
        }
    }

    /// Seconds left on the corrected clock
    pub fn remaining(&self, local_now: TimestampMs) -> u64 {
        self.round_ends_at
            .map(|ends_at| remaining_seconds(ends_at, self.clock.corrected(local_now)))
            .unwrap_or(0)
    }

    /// Remaining time as shown to the player, `m:ss`
    pub fn clock_display(&self, local_now: TimestampMs) -> String {
        format_clock(self.remaining(local_now))
    }

    /// Editing and manual submission are closed
    pub fn is_locked(&self, local_now: TimestampMs) -> bool {
        self.submitted || self.pending || self.remaining(local_now) == 0
    }

    pub fn set_draft(&mut self, text: &str, local_now: TimestampMs) -> Result<(), SessionError> {
        if self.is_locked(local_now) {
            return Err(SessionError::Locked);
        }
        self.draft = text.to_string();
        Ok(())
    }

    /// Manual submission while time remains
    pub fn submit(&mut self, local_now: TimestampMs) -> Result<SubmitIntent, SessionError> {
        if self.phase() != SessionPhase::Playing {
            return Err(SessionError::NotInRound);
        }
        if self.is_locked(local_now) {
            return Err(SessionError::Locked);
        }
        self.pending = true;
        Ok(SubmitIntent {
            player_id: self.player_id.clone(),
            response: self.draft.clone(),
            automatic: false,
            round_ends_at: self.round_ends_at,
        })
    }

    /// Periodic re-evaluation. Yields the auto-submit at most once per round.
    pub fn tick(&mut self, local_now: TimestampMs) -> Option<SubmitIntent> {
        if self.phase() != SessionPhase::Playing
            || self.remaining(local_now) > 0
            || self.submitted
            || self.pending
            || self.auto_fired
        {
            return None;
        }

        self.auto_fired = true;
        self.pending = true;
        let response = if self.draft.trim().is_empty() {
            NO_RESPONSE_PLACEHOLDER.to_string()
        } else {
            self.draft.clone()
        };
        Some(SubmitIntent {
            player_id: self.player_id.clone(),
            response,
            automatic: true,
            round_ends_at: self.round_ends_at,
        })
    }

    /// The submission landed. Ignored if a new round began meanwhile.
    pub fn confirm_submitted(&mut self, intent: &SubmitIntent) {
        if intent.round_ends_at != self.round_ends_at {
            tracing::debug!("Ignoring confirmation for a previous round");
            return;
        }
        self.pending = false;
        self.submitted = true;
    }

    /// The submission failed; a manual one may be retried while time
    /// remains. Ignored if a new round began meanwhile.
    pub fn submit_failed(&mut self, intent: &SubmitIntent) {
        if intent.round_ends_at != self.round_ends_at {
            return;
        }
        self.pending = false;
    }
}
