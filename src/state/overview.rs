use super::AppState;
use crate::countdown::{format_clock, now_millis, remaining_seconds};
use crate::error::GameResult;
use crate::protocol::{AdminOverview, StateSnapshot};
use crate::types::*;

/// Dashboard status for a game state at `now`
pub fn round_status(game_state: &GameState, now: TimestampMs) -> RoundStatus {
    match (game_state.started, game_state.round_ends_at) {
        (true, Some(ends_at)) if remaining_seconds(ends_at, now) > 0 => RoundStatus::Active,
        (true, _) => RoundStatus::Ended,
        (false, _) => RoundStatus::Waiting,
    }
}

impl AppState {
    pub async fn snapshot(&self) -> GameResult<StateSnapshot> {
        Ok(StateSnapshot {
            game_state: self.store.game_state().await?,
            players: self.store.players().await?,
            server_now: now_millis(),
        })
    }

    /// Summary shown on the admin dashboard
    pub async fn admin_overview(&self) -> GameResult<AdminOverview> {
        let snapshot = self.snapshot().await?;
        let now = snapshot.server_now;

        let submitted_count = snapshot.players.iter().filter(|p| p.submitted).count();
        let remaining = snapshot
            .game_state
            .round_ends_at
            .map(|ends_at| remaining_seconds(ends_at, now))
            .unwrap_or(0);

        Ok(AdminOverview {
            status: round_status(&snapshot.game_state, now),
            missing_count: snapshot.players.len() - submitted_count,
            submitted_count,
            remaining_seconds: remaining,
            clock: format_clock(remaining),
            scenarios: self.catalog.entries(),
            game_state: snapshot.game_state,
            players: snapshot.players,
            server_now: now,
        })
    }
}
